use chronicle_core::aggregate::Watermark;
use chronicle_core::transcript::TranscriptEntry;

/// The contiguous transcript range not yet folded into the aggregate,
/// rendered for the generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptSlice {
    /// Labeled lines, one per entry, separated by blank lines.
    pub text: String,
    pub count: usize,
    /// Human-readable 1-based range, e.g. `"5-9"`.
    pub range: String,
    /// 0-based inclusive bounds.
    pub start: usize,
    pub end: usize,
}

/// Compute the pending slice `[watermark + 1, min(target_index, len - 1)]`.
/// Returns `None` when nothing is pending — callers treat that as a
/// successful no-op, never an error.
pub fn select_slice(
    entries: &[TranscriptEntry],
    target_index: usize,
    watermark: Watermark,
) -> Option<TranscriptSlice> {
    if entries.is_empty() {
        return None;
    }

    let start = (watermark + 1).max(0) as usize;
    let end = target_index.min(entries.len() - 1);
    if start > end {
        return None;
    }

    let text = entries[start..=end]
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n\n");

    Some(TranscriptSlice {
        text,
        count: end - start + 1,
        range: format!("{}-{}", start + 1, end + 1),
        start,
        end,
    })
}

/// `#<1-based index> [<speaker>]: <text>`
fn render_line(entry: &TranscriptEntry) -> String {
    format!("#{} [{}]: {}", entry.index + 1, entry.speaker(), entry.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::aggregate::UNSUMMARIZED;
    use chronicle_core::transcript::SpeakerRole;

    fn transcript(n: usize) -> Vec<TranscriptEntry> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 {
                    SpeakerRole::User
                } else {
                    SpeakerRole::Character
                };
                TranscriptEntry::new(i, role, format!("line {i}"))
            })
            .collect()
    }

    #[test]
    fn first_slice_covers_everything() {
        let entries = transcript(3);
        let slice = select_slice(&entries, 2, UNSUMMARIZED).unwrap();
        assert_eq!(slice.start, 0);
        assert_eq!(slice.end, 2);
        assert_eq!(slice.count, 3);
        assert_eq!(slice.range, "1-3");
    }

    #[test]
    fn slice_starts_after_watermark() {
        let entries = transcript(10);
        let slice = select_slice(&entries, 9, 4).unwrap();
        assert_eq!(slice.start, 5);
        assert_eq!(slice.end, 9);
        assert_eq!(slice.count, 5);
        assert_eq!(slice.range, "6-10");
    }

    #[test]
    fn target_clamped_to_transcript_end() {
        let entries = transcript(4);
        let slice = select_slice(&entries, 99, UNSUMMARIZED).unwrap();
        assert_eq!(slice.end, 3);
    }

    #[test]
    fn fully_summarized_yields_none() {
        let entries = transcript(5);
        assert!(select_slice(&entries, 4, 4).is_none());
    }

    #[test]
    fn target_behind_watermark_yields_none() {
        let entries = transcript(10);
        assert!(select_slice(&entries, 3, 6).is_none());
    }

    #[test]
    fn empty_transcript_yields_none() {
        assert!(select_slice(&[], 0, UNSUMMARIZED).is_none());
    }

    #[test]
    fn lines_are_labeled_and_one_based() {
        let entries = vec![
            TranscriptEntry::named(0, SpeakerRole::User, "Sam", "who goes there?"),
            TranscriptEntry::new(1, SpeakerRole::Character, "a stranger"),
        ];
        let slice = select_slice(&entries, 1, UNSUMMARIZED).unwrap();
        assert_eq!(slice.text, "#1 [Sam]: who goes there?\n\n#2 [character]: a stranger");
    }
}
