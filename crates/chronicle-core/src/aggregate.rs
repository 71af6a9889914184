use serde::{Deserialize, Serialize};

/// Last transcript index already folded into the aggregate.
/// `-1` means nothing has been summarized yet.
pub type Watermark = i64;

pub const UNSUMMARIZED: Watermark = -1;

/// A deduplicated story keyword.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub added_at: Watermark,
}

/// One committed story event. Events are append-only: the merger never
/// deduplicates or rewrites them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time_label: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub added_at: Watermark,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainCharacter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub added_at: Watermark,
}

/// A directed relationship edge. Unlike events this is a mutable fact:
/// label and trend are overwritten in place on re-observation, while
/// `added_at` keeps the tag from the edge's first appearance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub trend: String,
    #[serde(default)]
    pub added_at: Watermark,
}

impl Relationship {
    /// Ordered-pair merge key.
    pub fn key(&self) -> String {
        format!("{}->{}", self.from, self.to)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characters {
    #[serde(default)]
    pub main: Vec<MainCharacter>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcMoment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub added_at: Watermark,
}

/// Per-character arc state. Trajectory and progress track the latest
/// observation; moments accumulate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterArc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trajectory: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub moments: Vec<ArcMoment>,
    #[serde(default)]
    pub added_at: Watermark,
}

/// The cumulative structured summary for one conversation. Absent until the
/// first successful merge; mutated only by the merger and the rollback
/// engine. Every tagged item carries the watermark at which it was
/// committed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub events: Vec<StoryEvent>,
    #[serde(default)]
    pub characters: Characters,
    #[serde(default)]
    pub arcs: Vec<CharacterArc>,
}

const EVENT_ID_PREFIX: &str = "evt-";

impl Aggregate {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Next `evt-<n>` number: max numeric suffix among retained events,
    /// plus one. Recomputed fresh each cycle rather than stored, so after a
    /// rollback removes high-numbered events the next id may reuse a
    /// previously seen number. IDs are only unique among currently-retained
    /// events.
    pub fn next_event_id(&self) -> u64 {
        self.events
            .iter()
            .map(|e| parse_event_number(&e.id).unwrap_or(0))
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Extract the numeric suffix of an `evt-<n>` identifier.
pub fn parse_event_number(id: &str) -> Option<u64> {
    id.strip_prefix(EVENT_ID_PREFIX)?.parse().ok()
}

/// Format an event identifier from its numeric tag.
pub fn format_event_id(n: u64) -> String {
    format!("{EVENT_ID_PREFIX}{n}")
}

/// One entry of the snapshot ledger: the watermark of a successful merge
/// cycle and when it was recorded (epoch milliseconds).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub end_mes_id: Watermark,
    pub created_at: i64,
}

/// Reporting snapshot handed to the host after each cycle or rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_entries: usize,
    pub summarized_up_to: i64,
    pub event_count: usize,
    pub pending_entries: i64,
}

impl SummaryStats {
    pub fn compute(transcript_len: usize, watermark: Watermark, event_count: usize) -> Self {
        Self {
            total_entries: transcript_len,
            summarized_up_to: watermark + 1,
            event_count,
            pending_entries: transcript_len as i64 - watermark - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> StoryEvent {
        StoryEvent {
            id: id.into(),
            title: "t".into(),
            time_label: "opening".into(),
            summary: "s".into(),
            participants: vec![],
            kind: "development".into(),
            impact: "low".into(),
            added_at: 0,
        }
    }

    #[test]
    fn next_event_id_starts_at_one() {
        assert_eq!(Aggregate::default().next_event_id(), 1);
    }

    #[test]
    fn next_event_id_is_max_plus_one() {
        let agg = Aggregate {
            events: vec![event("evt-2"), event("evt-7"), event("evt-4")],
            ..Default::default()
        };
        assert_eq!(agg.next_event_id(), 8);
    }

    #[test]
    fn unparsable_ids_count_as_zero() {
        let agg = Aggregate {
            events: vec![event("garbage"), event("evt-x"), event("evt-3")],
            ..Default::default()
        };
        assert_eq!(agg.next_event_id(), 4);
    }

    #[test]
    fn event_id_roundtrip() {
        assert_eq!(parse_event_number(&format_event_id(12)), Some(12));
        assert_eq!(parse_event_number("evt-9"), Some(9));
        assert_eq!(parse_event_number("event-9"), None);
    }

    #[test]
    fn stats_arithmetic() {
        let stats = SummaryStats::compute(12, 9, 5);
        assert_eq!(stats.total_entries, 12);
        assert_eq!(stats.summarized_up_to, 10);
        assert_eq!(stats.event_count, 5);
        assert_eq!(stats.pending_entries, 2);
    }

    #[test]
    fn stats_for_unsummarized_conversation() {
        let stats = SummaryStats::compute(4, UNSUMMARIZED, 0);
        assert_eq!(stats.summarized_up_to, 0);
        assert_eq!(stats.pending_entries, 4);
    }

    #[test]
    fn aggregate_serializes_camel_case() {
        let agg = Aggregate {
            events: vec![event("evt-1")],
            ..Default::default()
        };
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["events"][0]["timeLabel"], "opening");
        assert_eq!(json["events"][0]["type"], "development");
        assert_eq!(json["events"][0]["addedAt"], 0);
    }

    #[test]
    fn ledger_entry_serializes_interface_keys() {
        let entry = LedgerEntry {
            end_mes_id: 9,
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["endMesId"], 9);
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
    }
}
