use tracing::info;

use chronicle_core::aggregate::{Aggregate, Watermark, UNSUMMARIZED};

use crate::ledger::SnapshotLedger;

/// Minimum number of removed, previously-summarized entries before a
/// backward edit triggers a rollback. Below this the shrink is tolerated
/// and stale facts are left in place until enough drift accumulates — a
/// hysteresis policy, not a correctness guarantee.
pub const ROLLBACK_THRESHOLD: i64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackOutcome {
    /// Watermark restored to, or `UNSUMMARIZED` on a full reset.
    pub target: Watermark,
    /// How many previously-summarized entries were removed from the tail.
    pub removed: i64,
    pub full_reset: bool,
}

/// Restore a historically-consistent state after the transcript shrank.
///
/// Triggers only when previously-summarized entries were among those
/// removed (`current_len ≤ watermark`) and at least [`ROLLBACK_THRESHOLD`]
/// of them are gone. The restore filters tagged facts rather than replaying
/// increments from genesis: every collection keeps only items with
/// `added_at ≤ target`, the watermark jumps back to the target, and the
/// ledger is truncated to match. Idempotent — a second pass at the same
/// length finds nothing to do.
pub fn maybe_rollback(
    aggregate: &mut Option<Aggregate>,
    watermark: &mut Watermark,
    ledger: &mut SnapshotLedger,
    current_len: usize,
) -> Option<RollbackOutcome> {
    if *watermark < 0 || (current_len as i64) > *watermark {
        return None;
    }

    let removed = *watermark + 1 - current_len as i64;
    if removed < ROLLBACK_THRESHOLD {
        return None;
    }

    let target = ledger.find_rollback_target(current_len);
    info!(removed, target, "transcript shrank past watermark, rolling back");

    if target == UNSUMMARIZED {
        *aggregate = None;
        *watermark = UNSUMMARIZED;
        ledger.clear();
        return Some(RollbackOutcome {
            target,
            removed,
            full_reset: true,
        });
    }

    if let Some(agg) = aggregate.as_mut() {
        filter_aggregate(agg, target);
    }
    *watermark = target;
    ledger.truncate_to(target);

    Some(RollbackOutcome {
        target,
        removed,
        full_reset: false,
    })
}

/// Keep only facts committed at or before `target`.
fn filter_aggregate(aggregate: &mut Aggregate, target: Watermark) {
    aggregate.events.retain(|e| e.added_at <= target);
    aggregate.keywords.retain(|k| k.added_at <= target);
    aggregate.arcs.retain(|a| a.added_at <= target);
    for arc in &mut aggregate.arcs {
        arc.moments.retain(|m| m.added_at <= target);
    }
    aggregate.characters.main.retain(|m| m.added_at <= target);
    aggregate
        .characters
        .relationships
        .retain(|r| r.added_at <= target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::aggregate::{
        ArcMoment, CharacterArc, Keyword, MainCharacter, Relationship, StoryEvent,
    };

    fn tagged_aggregate() -> Aggregate {
        let event = |id: &str, tag: Watermark| StoryEvent {
            id: id.into(),
            title: format!("event {id}"),
            added_at: tag,
            ..Default::default()
        };
        Aggregate {
            keywords: vec![
                Keyword { text: "oath".into(), weight: "core".into(), added_at: 4 },
                Keyword { text: "gate".into(), weight: "minor".into(), added_at: 19 },
            ],
            events: vec![event("evt-1", 4), event("evt-2", 9), event("evt-3", 19)],
            characters: chronicle_core::aggregate::Characters {
                main: vec![
                    MainCharacter { name: "Mira".into(), added_at: 4 },
                    MainCharacter { name: "Sam".into(), added_at: 19 },
                ],
                relationships: vec![
                    Relationship {
                        from: "Mira".into(),
                        to: "Sam".into(),
                        label: "allies".into(),
                        trend: "closer".into(),
                        added_at: 9,
                    },
                    Relationship {
                        from: "Sam".into(),
                        to: "Mira".into(),
                        label: "wary".into(),
                        trend: "new".into(),
                        added_at: 19,
                    },
                ],
            },
            arcs: vec![CharacterArc {
                name: "Mira".into(),
                trajectory: "tested".into(),
                progress: 0.6,
                moments: vec![
                    ArcMoment { text: "takes the oath".into(), added_at: 4 },
                    ArcMoment { text: "breaks the oath".into(), added_at: 19 },
                ],
                added_at: 4,
            }],
        }
    }

    fn ledger(watermarks: &[Watermark]) -> SnapshotLedger {
        let mut l = SnapshotLedger::new();
        for &w in watermarks {
            l.record(w);
        }
        l
    }

    #[test]
    fn shrink_past_watermark_rolls_back_to_prior_snapshot() {
        // Scenario: ledger {9, 19}, transcript shrinks 25 → 15. Ten
        // previously-summarized entries are gone, so the state rolls back
        // to watermark 9.
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 19;
        let mut snapshots = ledger(&[9, 19]);

        let outcome = maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 15).unwrap();
        assert_eq!(outcome.target, 9);
        assert_eq!(outcome.removed, 5);
        assert!(!outcome.full_reset);

        assert_eq!(watermark, 9);
        let recorded: Vec<Watermark> =
            snapshots.entries().iter().map(|e| e.end_mes_id).collect();
        assert_eq!(recorded, vec![9]);

        let agg = aggregate.unwrap();
        assert_eq!(agg.events.len(), 2);
        assert!(agg.events.iter().all(|e| e.added_at <= 9));
        assert_eq!(agg.keywords.len(), 1);
        assert_eq!(agg.characters.main.len(), 1);
        assert_eq!(agg.characters.relationships.len(), 1);
        assert_eq!(agg.arcs.len(), 1);
        assert_eq!(agg.arcs[0].moments.len(), 1);
    }

    #[test]
    fn surviving_items_satisfy_invariant() {
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 19;
        let mut snapshots = ledger(&[9, 19]);

        maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 12).unwrap();

        let agg = aggregate.unwrap();
        let len = 12i64;
        for tag in agg
            .events
            .iter()
            .map(|e| e.added_at)
            .chain(agg.keywords.iter().map(|k| k.added_at))
            .chain(agg.characters.main.iter().map(|m| m.added_at))
            .chain(agg.characters.relationships.iter().map(|r| r.added_at))
            .chain(agg.arcs.iter().map(|a| a.added_at))
        {
            assert!(tag <= watermark && watermark < len);
        }
    }

    #[test]
    fn small_shrink_below_threshold_is_tolerated() {
        // Scenario: only 2 summarized entries removed — below the
        // threshold, so nothing changes.
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 19;
        let mut snapshots = ledger(&[9, 19]);
        let before = aggregate.clone();

        assert!(maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 18).is_none());
        assert_eq!(watermark, 19);
        assert_eq!(aggregate, before);
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn shrink_that_spares_summarized_entries_is_ignored() {
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 9;
        let mut snapshots = ledger(&[9]);

        // Length 12 > watermark 9: only unsummarized tail entries vanished.
        assert!(maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 12).is_none());
    }

    #[test]
    fn no_usable_snapshot_means_full_reset() {
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 19;
        let mut snapshots = ledger(&[9, 19]);

        let outcome = maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 5).unwrap();
        assert!(outcome.full_reset);
        assert_eq!(outcome.target, UNSUMMARIZED);
        assert!(aggregate.is_none());
        assert_eq!(watermark, UNSUMMARIZED);
        assert!(snapshots.is_empty());
    }

    #[test]
    fn unsummarized_conversation_never_rolls_back() {
        let mut aggregate: Option<Aggregate> = None;
        let mut watermark: Watermark = UNSUMMARIZED;
        let mut snapshots = SnapshotLedger::new();

        assert!(maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 0).is_none());
    }

    #[test]
    fn rollback_is_idempotent() {
        let mut aggregate = Some(tagged_aggregate());
        let mut watermark: Watermark = 19;
        let mut snapshots = ledger(&[9, 19]);

        maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 15).unwrap();
        let once = (aggregate.clone(), watermark, snapshots.clone());

        // A second observation at the same length finds watermark 9 < 15
        // and does nothing.
        assert!(maybe_rollback(&mut aggregate, &mut watermark, &mut snapshots, 15).is_none());
        assert_eq!((aggregate, watermark, snapshots), once);
    }
}
