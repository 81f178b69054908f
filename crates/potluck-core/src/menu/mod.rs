//! Bulk slot import from a TOML menu file.

pub mod parser;
pub mod toml_format;

use std::path::Path;

use uuid::Uuid;

use potluck_db::models::PlanItem;

use crate::error::Result;
use crate::plan_item::PlanItemStateMachine;

pub use parser::{MAX_SLOT_COUNT, MenuParseError, load_menu, parse_menu};
pub use toml_format::{MenuToml, SlotToml};

/// Parse a menu file and add all of its slots to the meal in one batch.
pub async fn import_menu(
    items: &PlanItemStateMachine,
    meal_id: Uuid,
    actor: Uuid,
    path: &Path,
) -> Result<Vec<PlanItem>> {
    let specs = load_menu(path)?;
    tracing::debug!(meal_id = %meal_id, path = %path.display(), slots = specs.len(), "importing menu");
    items.add_items(meal_id, actor, &specs).await
}
