//! Menu TOML parser with validation.
//!
//! Parses a menu string into the slot specs accepted by
//! [`crate::plan_item::PlanItemStateMachine::add_items`] and validates:
//! - At least one slot is present.
//! - Course values are valid [`Course`] variants.
//! - Names, when given, are not blank.
//! - `count` is between 1 and [`MAX_SLOT_COUNT`].

use std::path::Path;

use potluck_db::models::{Course, NewPlanItem};
use thiserror::Error;

use super::toml_format::MenuToml;
use crate::error::PotluckError;

pub const MAX_SLOT_COUNT: u32 = 20;

/// Errors that can occur while reading a menu.
#[derive(Debug, Error)]
pub enum MenuParseError {
    #[error("failed to read menu file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("menu must contain at least one slot")]
    NoSlots,

    #[error("invalid course {value:?} in slot {index} (expected appetizer, salad, main, side, dessert, drink, or other)")]
    InvalidCourse { index: usize, value: String },

    #[error("slot {index} has a blank name")]
    BlankName { index: usize },

    #[error("slot {index} has count {count} (expected 1 to {max})", max = MAX_SLOT_COUNT)]
    InvalidCount { index: usize, count: u32 },
}

impl From<MenuParseError> for PotluckError {
    fn from(err: MenuParseError) -> Self {
        PotluckError::Validation(err.to_string())
    }
}

/// Parse and validate a menu string. Slot indices in errors are 1-based.
pub fn parse_menu(content: &str) -> Result<Vec<NewPlanItem>, MenuParseError> {
    let menu: MenuToml = toml::from_str(content)?;
    if menu.slots.is_empty() {
        return Err(MenuParseError::NoSlots);
    }

    let mut items = Vec::new();
    for (i, slot) in menu.slots.into_iter().enumerate() {
        let index = i + 1;
        let course: Course = slot
            .course
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| MenuParseError::InvalidCourse {
                index,
                value: slot.course.clone(),
            })?;
        if slot.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(MenuParseError::BlankName { index });
        }
        if !(1..=MAX_SLOT_COUNT).contains(&slot.count) {
            return Err(MenuParseError::InvalidCount {
                index,
                count: slot.count,
            });
        }

        let spec = NewPlanItem {
            course,
            name: slot.name.map(|n| n.trim().to_owned()),
            is_main_dish: slot.main,
            assigned_to: slot.assign_to,
        };
        items.extend(std::iter::repeat_n(spec, slot.count as usize));
    }
    Ok(items)
}

/// Read and parse a menu file.
pub fn load_menu(path: &Path) -> Result<Vec<NewPlanItem>, MenuParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_menu(&content)
}
