use chrono::Utc;

use chronicle_core::aggregate::{LedgerEntry, Watermark, UNSUMMARIZED};

/// Ordered record of successful merge watermarks, used to pick a rollback
/// target after the transcript shrinks. Entries are scalar-sized and
/// retained indefinitely; the ledger is only ever truncated from the tail
/// during rollback.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotLedger {
    entries: Vec<LedgerEntry>,
}

impl SnapshotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a successful merge watermark. Watermarks must strictly
    /// increase across entries; a non-increasing watermark is ignored —
    /// merges are already ordered by construction, so this only defends
    /// against a misbehaving caller.
    pub fn record(&mut self, watermark: Watermark) {
        if let Some(last) = self.entries.last() {
            if watermark <= last.end_mes_id {
                return;
            }
        }
        self.entries.push(LedgerEntry {
            end_mes_id: watermark,
            created_at: Utc::now().timestamp_millis(),
        });
    }

    /// Greatest recorded watermark strictly below `current_len`, scanning
    /// most-recent-first. Returns the `UNSUMMARIZED` sentinel when no entry
    /// qualifies — meaning "full reset".
    pub fn find_rollback_target(&self, current_len: usize) -> Watermark {
        self.entries
            .iter()
            .rev()
            .find(|e| e.end_mes_id < current_len as i64)
            .map(|e| e.end_mes_id)
            .unwrap_or(UNSUMMARIZED)
    }

    /// Drop every entry with a watermark above `target`.
    pub fn truncate_to(&mut self, target: Watermark) {
        self.entries.retain(|e| e.end_mes_id <= target);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(watermarks: &[Watermark]) -> SnapshotLedger {
        let mut l = SnapshotLedger::new();
        for &w in watermarks {
            l.record(w);
        }
        l
    }

    #[test]
    fn records_in_order() {
        let l = ledger(&[4, 9, 19]);
        let recorded: Vec<Watermark> = l.entries().iter().map(|e| e.end_mes_id).collect();
        assert_eq!(recorded, vec![4, 9, 19]);
        assert!(l.entries().iter().all(|e| e.created_at > 0));
    }

    #[test]
    fn non_increasing_watermark_ignored() {
        let l = ledger(&[4, 9, 9, 7]);
        let recorded: Vec<Watermark> = l.entries().iter().map(|e| e.end_mes_id).collect();
        assert_eq!(recorded, vec![4, 9]);
    }

    #[test]
    fn target_is_greatest_below_length() {
        let l = ledger(&[9, 19]);
        assert_eq!(l.find_rollback_target(15), 9);
        assert_eq!(l.find_rollback_target(25), 19);
        assert_eq!(l.find_rollback_target(20), 19);
    }

    #[test]
    fn target_falls_back_to_sentinel() {
        let l = ledger(&[9, 19]);
        assert_eq!(l.find_rollback_target(9), UNSUMMARIZED);
        assert_eq!(l.find_rollback_target(0), UNSUMMARIZED);
        assert_eq!(SnapshotLedger::new().find_rollback_target(100), UNSUMMARIZED);
    }

    #[test]
    fn truncate_keeps_at_or_below_target() {
        let mut l = ledger(&[4, 9, 19]);
        l.truncate_to(9);
        let recorded: Vec<Watermark> = l.entries().iter().map(|e| e.end_mes_id).collect();
        assert_eq!(recorded, vec![4, 9]);
    }

    #[test]
    fn roundtrip_through_entries() {
        let l = ledger(&[2, 5]);
        let copy = SnapshotLedger::from_entries(l.entries().to_vec());
        assert_eq!(copy, l);
    }
}
