use chronicle_core::aggregate::{Aggregate, Watermark};
use chronicle_core::injection::PromptInjection;

/// Render the aggregate into the single injectable block handed to the
/// host.
///
/// Suppresses injection entirely — returns `None`, which tells the host to
/// remove any prior block — when the aggregate is absent, when there is
/// nothing to say, or when `watermark ≥ transcript_len` (a consistency
/// failure that self-heals here instead of surfacing to the caller).
///
/// `depth` is the number of transcript entries after the summarized
/// boundary: the trailing turns the host should keep in full alongside the
/// summary.
pub fn project(
    aggregate: Option<&Aggregate>,
    watermark: Watermark,
    transcript_len: usize,
) -> Option<PromptInjection> {
    let aggregate = aggregate?;

    if watermark >= transcript_len as i64 {
        return None;
    }

    let text = render_injection(aggregate)?;
    let depth = (transcript_len as i64 - watermark - 1).max(0) as usize;

    Some(PromptInjection::in_chat(text, depth))
}

/// Deterministic grouped rendering: keywords, events in commit order, arc
/// states. `None` when every section is empty.
fn render_injection(aggregate: &Aggregate) -> Option<String> {
    let mut parts = Vec::new();

    if !aggregate.keywords.is_empty() {
        let keywords: Vec<&str> = aggregate.keywords.iter().map(|k| k.text.as_str()).collect();
        parts.push(format!("Keywords: {}", keywords.join(" / ")));
    }

    if !aggregate.events.is_empty() {
        let lines: Vec<String> = aggregate
            .events
            .iter()
            .map(|e| format!("- [{}] {}: {}", e.time_label, e.title, e.summary))
            .collect();
        parts.push(format!("Events:\n{}", lines.join("\n")));
    }

    if !aggregate.arcs.is_empty() {
        let lines: Vec<String> = aggregate
            .arcs
            .iter()
            .map(|a| format!("- {}: {}", a.name, a.trajectory))
            .collect();
        parts.push(format!("Character state:\n{}", lines.join("\n")));
    }

    if parts.is_empty() {
        return None;
    }

    let header =
        "This is a summary of the visible history above and of earlier history no longer visible.";
    Some(format!(
        "<story-summary>\n{header}\n\n{}\n</story-summary>",
        parts.join("\n\n")
    ))
}

/// Render the existing aggregate as the prior-context text fed back into
/// the next extraction request.
pub fn render_prior_context(aggregate: Option<&Aggregate>) -> String {
    let Some(aggregate) = aggregate else {
        return "(empty — this is the first pass)".to_string();
    };

    let mut parts = Vec::new();

    if !aggregate.events.is_empty() {
        parts.push("[Recorded events]".to_string());
        for (i, e) in aggregate.events.iter().enumerate() {
            parts.push(format!("{}. [{}] {}: {}", i + 1, e.time_label, e.title, e.summary));
        }
    }

    if !aggregate.characters.main.is_empty() {
        let names: Vec<&str> = aggregate
            .characters
            .main
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        parts.push(format!("[Main cast] {}", names.join(", ")));
    }

    if !aggregate.characters.relationships.is_empty() {
        parts.push("[Relationships]".to_string());
        for r in &aggregate.characters.relationships {
            parts.push(format!("- {} -> {}: {} ({})", r.from, r.to, r.label, r.trend));
        }
    }

    if !aggregate.arcs.is_empty() {
        parts.push("[Character arcs]".to_string());
        for a in &aggregate.arcs {
            parts.push(format!(
                "- {}: {} (progress {}%)",
                a.name,
                a.trajectory,
                (a.progress * 100.0).round() as i64
            ));
        }
    }

    if !aggregate.keywords.is_empty() {
        let keywords: Vec<&str> = aggregate.keywords.iter().map(|k| k.text.as_str()).collect();
        parts.push(format!("[Keywords] {}", keywords.join(", ")));
    }

    if parts.is_empty() {
        "(empty — this is the first pass)".to_string()
    } else {
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::aggregate::{CharacterArc, Keyword, StoryEvent};
    use chronicle_core::injection::ChatRole;

    fn sample_aggregate() -> Aggregate {
        Aggregate {
            keywords: vec![
                Keyword { text: "oath".into(), ..Default::default() },
                Keyword { text: "gate".into(), ..Default::default() },
            ],
            events: vec![StoryEvent {
                id: "evt-1".into(),
                title: "The gate opens".into(),
                time_label: "opening".into(),
                summary: "the gate opens (#1-5)".into(),
                ..Default::default()
            }],
            arcs: vec![CharacterArc {
                name: "Mira".into(),
                trajectory: "tested".into(),
                progress: 0.6,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn depth_counts_entries_after_boundary() {
        let inj = project(Some(&sample_aggregate()), 9, 12).unwrap();
        assert_eq!(inj.depth, 2);
        assert_eq!(inj.position, "in-chat");
        assert_eq!(inj.role, ChatRole::Assistant);
    }

    #[test]
    fn depth_is_zero_at_the_boundary() {
        let inj = project(Some(&sample_aggregate()), 9, 10).unwrap();
        assert_eq!(inj.depth, 0);
    }

    #[test]
    fn absent_aggregate_suppresses_injection() {
        assert!(project(None, 4, 10).is_none());
    }

    #[test]
    fn inconsistent_watermark_suppresses_injection() {
        // watermark ≥ length: summarized entries no longer exist. The
        // projector self-heals by removing the block, never erroring.
        let agg = sample_aggregate();
        assert!(project(Some(&agg), 12, 12).is_none());
        assert!(project(Some(&agg), 15, 12).is_none());
    }

    #[test]
    fn empty_aggregate_suppresses_injection() {
        assert!(project(Some(&Aggregate::default()), 0, 5).is_none());
    }

    #[test]
    fn rendering_groups_sections() {
        let inj = project(Some(&sample_aggregate()), 4, 10).unwrap();
        assert!(inj.value.starts_with("<story-summary>"));
        assert!(inj.value.ends_with("</story-summary>"));
        assert!(inj.value.contains("Keywords: oath / gate"));
        assert!(inj.value.contains("- [opening] The gate opens: the gate opens (#1-5)"));
        assert!(inj.value.contains("Character state:\n- Mira: tested"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let agg = sample_aggregate();
        let a = project(Some(&agg), 4, 10).unwrap();
        let b = project(Some(&agg), 4, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prior_context_for_empty_state() {
        assert_eq!(render_prior_context(None), "(empty — this is the first pass)");
        assert_eq!(
            render_prior_context(Some(&Aggregate::default())),
            "(empty — this is the first pass)"
        );
    }

    #[test]
    fn prior_context_lists_all_sections() {
        let mut agg = sample_aggregate();
        agg.characters.main.push(chronicle_core::aggregate::MainCharacter {
            name: "Mira".into(),
            added_at: 0,
        });
        agg.characters
            .relationships
            .push(chronicle_core::aggregate::Relationship {
                from: "Mira".into(),
                to: "Sam".into(),
                label: "allies".into(),
                trend: "closer".into(),
                added_at: 0,
            });

        let text = render_prior_context(Some(&agg));
        assert!(text.contains("[Recorded events]"));
        assert!(text.contains("1. [opening] The gate opens"));
        assert!(text.contains("[Main cast] Mira"));
        assert!(text.contains("- Mira -> Sam: allies (closer)"));
        assert!(text.contains("- Mira: tested (progress 60%)"));
        assert!(text.contains("[Keywords] oath, gate"));
    }
}
