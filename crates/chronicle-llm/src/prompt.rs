use chronicle_core::injection::ChatMessage;

/// Build the four-message priming sequence for one incremental extraction:
/// instruction, acknowledgement, payload (existing summary + new transcript
/// lines + output schema), and a primed "generating JSON" turn. The
/// orchestrator depends only on this signature; the wording is free to
/// change without touching the cycle.
pub fn build_extraction_messages(
    prior_context: &str,
    slice_text: &str,
    slice_range: &str,
    next_event_id: u64,
) -> Vec<ChatMessage> {
    let instruction = "You are a story archivist. From the new dialogue, extract only the \
newly added story elements.\n\n\
Rules:\n\
- Output only what is new relative to the existing summary; never repeat \
recorded events or keywords.\n\
- Record only events that carry information. Classify each with a type and \
an impact level:\n\
  - high impact: turning points, revelations, conflicts, resolutions — the \
situation clearly changes from one state to another\n\
  - medium impact: developments and meaningful setup that later events will \
depend on\n\
  - low impact: everyday beats that still add texture to a character, a \
relationship, or a foreshadowed thread\n\
  - no impact: do not record";

    let ack = "Understood. I will output only new elements. Please provide the existing \
summary and the new dialogue.";

    let payload = format!(
        "<existing-summary>\n{prior_context}\n</existing-summary>\n\n\
<new-dialogue> (entries {slice_range})\n{slice_text}\n</new-dialogue>\n\n\
Output ONLY the new elements as a single JSON object:\n\
{{\n\
  \"keywords\": [{{\"text\": \"new keyword\", \"weight\": \"core|major|minor\"}}],\n\
  \"events\": [\n\
    {{\n\
      \"id\": \"evt-<n>\",\n\
      \"title\": \"event title\",\n\
      \"timeLabel\": \"short timeline label (e.g. opening, second night)\",\n\
      \"summary\": \"one sentence, ending with the entry range, e.g. ... (#1-5)\",\n\
      \"participants\": [\"character name\"],\n\
      \"type\": \"conflict|revelation|turning-point|development|resolution|setup|slice-of-life\",\n\
      \"impact\": \"high|medium|low\"\n\
    }}\n\
  ],\n\
  \"newCharacters\": [\"newly appearing character name\"],\n\
  \"newRelationships\": [\n\
    {{\"from\": \"A\", \"to\": \"B\", \"label\": \"relationship\", \"trend\": \"closer|distant|steady|new|broken\"}}\n\
  ],\n\
  \"arcUpdates\": [\n\
    {{\"name\": \"character name\", \"trajectory\": \"latest state\", \"progress\": 0.0, \"newMoment\": \"new key moment\"}}\n\
  ]\n\
}}\n\n\
Notes:\n\
- Return an empty array for any category with nothing new.\n\
- Number event ids starting from evt-{next_event_id}.\n\
- Output exactly one valid JSON value and nothing else."
    );

    let primed = "Understood, generating the JSON now:";

    vec![
        ChatMessage::user(instruction),
        ChatMessage::assistant(ack),
        ChatMessage::user(payload),
        ChatMessage::assistant(primed),
    ]
}
