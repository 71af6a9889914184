use serde::{Deserialize, Serialize};

use crate::aggregate::{Keyword, Relationship, StoryEvent};

/// One arc update from the generation step. `new_moment`, when present, is
/// appended to the arc's moment list at merge time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trajectory: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub new_moment: Option<String>,
}

/// The structured fragment parsed from one generation response.
///
/// The producer is an external text-generation step that is not under this
/// system's control, so decoding is tolerant by contract: any missing or
/// malformed optional field collapses to an empty collection and never
/// raises.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Increment {
    pub keywords: Vec<Keyword>,
    pub events: Vec<StoryEvent>,
    pub new_characters: Vec<String>,
    pub new_relationships: Vec<Relationship>,
    pub arc_updates: Vec<ArcUpdate>,
}

impl Increment {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
            && self.events.is_empty()
            && self.new_characters.is_empty()
            && self.new_relationships.is_empty()
            && self.arc_updates.is_empty()
    }
}
