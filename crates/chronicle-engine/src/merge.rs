use std::collections::{HashMap, HashSet};

use chronicle_core::aggregate::{Aggregate, ArcMoment, CharacterArc, MainCharacter, Watermark};
use chronicle_core::increment::Increment;

/// Fold one parsed increment into the aggregate at `watermark`.
///
/// Produces a new value; the caller's aggregate is never mutated, so a
/// failed cycle downstream of the merge can simply drop the result. Must be
/// called once per committed cycle with `watermark` equal to the end of the
/// slice the increment was derived from.
///
/// Field rules:
/// - events: appended verbatim and tagged — an append-only log, no dedup;
/// - keywords: inserted only when no keyword with identical text exists;
/// - new characters: inserted only when absent by name;
/// - relationships: keyed by the ordered `(from, to)` pair — existing edges
///   get `label`/`trend` overwritten in place keeping their original tag,
///   new edges are inserted tagged;
/// - arc updates: keyed by character name — existing arcs get
///   `trajectory`/`progress` overwritten and an optional tagged moment
///   appended, new arcs are created tagged.
pub fn merge(existing: Option<&Aggregate>, increment: &Increment, watermark: Watermark) -> Aggregate {
    let mut merged = existing.cloned().unwrap_or_default();

    for event in &increment.events {
        let mut event = event.clone();
        event.added_at = watermark;
        merged.events.push(event);
    }

    let mut seen_keywords: HashSet<String> =
        merged.keywords.iter().map(|k| k.text.clone()).collect();
    for keyword in &increment.keywords {
        if seen_keywords.insert(keyword.text.clone()) {
            let mut keyword = keyword.clone();
            keyword.added_at = watermark;
            merged.keywords.push(keyword);
        }
    }

    let known_names: HashSet<String> = merged
        .characters
        .main
        .iter()
        .map(|m| m.name.clone())
        .collect();
    for name in &increment.new_characters {
        if !known_names.contains(name) {
            merged.characters.main.push(MainCharacter {
                name: name.clone(),
                added_at: watermark,
            });
        }
    }

    // Keyed lookup built once; merge cost stays proportional to the
    // increment, not to increment × aggregate.
    let mut rel_index: HashMap<String, usize> = merged
        .characters
        .relationships
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();
    for rel in &increment.new_relationships {
        match rel_index.get(&rel.key()) {
            Some(&i) => {
                let edge = &mut merged.characters.relationships[i];
                edge.label = rel.label.clone();
                edge.trend = rel.trend.clone();
            }
            None => {
                let mut rel = rel.clone();
                rel.added_at = watermark;
                rel_index.insert(rel.key(), merged.characters.relationships.len());
                merged.characters.relationships.push(rel);
            }
        }
    }

    let mut arc_index: HashMap<String, usize> = merged
        .arcs
        .iter()
        .enumerate()
        .map(|(i, a)| (a.name.clone(), i))
        .collect();
    for update in &increment.arc_updates {
        match arc_index.get(&update.name) {
            Some(&i) => {
                let arc = &mut merged.arcs[i];
                arc.trajectory = update.trajectory.clone();
                arc.progress = update.progress;
                if let Some(moment) = &update.new_moment {
                    arc.moments.push(ArcMoment {
                        text: moment.clone(),
                        added_at: watermark,
                    });
                }
            }
            None => {
                arc_index.insert(update.name.clone(), merged.arcs.len());
                merged.arcs.push(CharacterArc {
                    name: update.name.clone(),
                    trajectory: update.trajectory.clone(),
                    progress: update.progress,
                    moments: update
                        .new_moment
                        .as_ref()
                        .map(|m| {
                            vec![ArcMoment {
                                text: m.clone(),
                                added_at: watermark,
                            }]
                        })
                        .unwrap_or_default(),
                    added_at: watermark,
                });
            }
        }
    }

    merged
}
