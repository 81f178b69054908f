//! Handlers for `potluck item` subcommands.

use std::path::Path;

use anyhow::Result;
use uuid::Uuid;

use potluck_core::{Engine, menu};
use potluck_db::models::{NewPlanItem, PlanItem};

use crate::ItemCommands;
use crate::render;

fn slot_line(verb: &str, item: &PlanItem) -> String {
    format!("{} {} ({}): now {}.\n", verb, item.label(), item.id, item.status())
}

pub async fn run_item_command(
    command: ItemCommands,
    engine: &Engine,
    user: Uuid,
    json: bool,
) -> Result<()> {
    let items = &engine.items;
    match command {
        ItemCommands::Add {
            meal_id,
            course,
            name,
            main,
            assign,
        } => {
            let spec = NewPlanItem {
                course,
                name,
                is_main_dish: main,
                assigned_to: assign,
            };
            let item = items.add_item(meal_id, user, spec).await?;
            render::emit(json, &item, || Ok(slot_line("Added", &item)))
        }
        ItemCommands::Import { meal_id, file } => {
            let created = menu::import_menu(items, meal_id, user, Path::new(&file)).await?;
            render::emit(json, &created, || {
                Ok(format!("Imported {} slot(s) from {file}.\n", created.len()))
            })
        }
        ItemCommands::Assign {
            item_id,
            user: assignee,
        } => {
            let item = items.assign(item_id, user, assignee).await?;
            render::emit(json, &item, || Ok(slot_line("Assigned", &item)))
        }
        ItemCommands::Unassign { item_id } => {
            let item = items.unassign(item_id, user).await?;
            render::emit(json, &item, || Ok(slot_line("Unassigned", &item)))
        }
        ItemCommands::Claim { item_id } => {
            let item = items.claim(item_id, user).await?;
            render::emit(json, &item, || Ok(slot_line("Claimed", &item)))
        }
        ItemCommands::Volunteer { item_id, recipe_id } => {
            let item = items.volunteer(item_id, user, recipe_id).await?;
            render::emit(json, &item, || Ok(slot_line("Volunteered for", &item)))
        }
        ItemCommands::Unclaim { item_id } => {
            let item = items.unclaim(item_id, user).await?;
            render::emit(json, &item, || Ok(slot_line("Released", &item)))
        }
        ItemCommands::Recipe { item_id, recipe_id } => {
            let item = items.attach_recipe(item_id, user, recipe_id).await?;
            render::emit(json, &item, || Ok(slot_line("Recipe set on", &item)))
        }
        ItemCommands::Complete { item_id, dish_id } => {
            let item = items.complete(item_id, user, dish_id).await?;
            render::emit(json, &item, || Ok(slot_line("Cooked", &item)))
        }
        ItemCommands::Remove { item_id } => {
            items.remove_item(item_id, user).await?;
            render::emit(json, &item_id, || Ok(format!("Removed slot {item_id}.\n")))
        }
    }
}
