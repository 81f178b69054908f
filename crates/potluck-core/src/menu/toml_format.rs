//! On-disk format of a menu file.
//!
//! ```toml
//! [[slots]]
//! course = "main"
//! name = "Roast chicken"
//! main = true
//!
//! [[slots]]
//! course = "side"
//! count = 2
//! assign_to = "6f1c0c8e-3d4b-4c55-9a43-0d1c7a6d2b11"
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level structure of a menu file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuToml {
    #[serde(default)]
    pub slots: Vec<SlotToml>,
}

/// A single `[[slots]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotToml {
    /// Course name, e.g. "appetizer" or "dessert".
    pub course: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Marks the centerpiece dish.
    #[serde(default)]
    pub main: bool,
    /// Pre-assign the slot to this participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_to: Option<Uuid>,
    /// How many identical slots to create.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}
