use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One laid-out element carrying text that might be a countdown.
///
/// `id` is the page-side node identity. It stays the same for as long as the
/// node is attached, so an id missing from a later snapshot means "detached".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub font_size_px: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
}

impl ElementSnapshot {
    /// Geometry-only visibility: opacity and occlusion are ignored on purpose.
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Everything the page side reports for one poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
    /// Trimmed labels of visible buttons.
    #[serde(default)]
    pub buttons: Vec<String>,
    #[serde(default)]
    pub page_text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl Observation {
    pub fn element(&self, id: u64) -> Option<&ElementSnapshot> {
        self.elements.iter().find(|el| el.id == id)
    }
}

/// Messages arriving from the page side, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    Snapshot(Observation),
    Visibility { visible: bool },
    Teardown,
}

/// Anything that can hand the poll loop the most recent page snapshot.
pub trait ObservationSource: Send {
    fn latest(&mut self) -> Option<Observation>;
}

impl ObservationSource for watch::Receiver<Option<Observation>> {
    fn latest(&mut self) -> Option<Observation> {
        self.borrow_and_update().clone()
    }
}
