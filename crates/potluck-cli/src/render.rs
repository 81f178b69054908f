//! Plain-text rendering for command output.
//!
//! Every function builds a `String` so the layout can be tested without
//! capturing stdout.

use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use potluck_core::grouping::FeedUnit;
use potluck_core::meal::MealDetails;
use potluck_core::plan_item::Progress;
use potluck_db::models::{Meal, MealDish, ParticipantProfile, PlanItem, Post, PostKind};

/// Print `value` as pretty JSON, or the text rendering otherwise.
pub fn emit<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> Result<String>,
) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
        println!("{out}");
    } else {
        print!("{}", text()?);
    }
    Ok(())
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Display names keyed by user ID, for resolving slot holders.
pub fn name_index(roster: &[ParticipantProfile]) -> HashMap<Uuid, String> {
    roster
        .iter()
        .map(|p| (p.user_id, p.display_name.clone()))
        .collect()
}

fn who(names: &HashMap<Uuid, String>, id: Uuid) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

/// One line per meal: id, status, schedule, title.
pub fn meal_list(meals: &[Meal]) -> Result<String> {
    if meals.is_empty() {
        return Ok("No meals found. Use `potluck meal create` to plan one.\n".to_owned());
    }
    let mut out = String::new();
    writeln!(out, "{:<36}  {:<9}  {:<20}  TITLE", "ID", "STATUS", "SCHEDULED")?;
    for meal in meals {
        writeln!(
            out,
            "{:<36}  {:<9}  {:<20}  {}",
            meal.id,
            meal.status.to_string(),
            timestamp(meal.scheduled_at),
            meal.title
        )?;
    }
    Ok(out)
}

/// Header block, roster, and slot table for `meal show`.
pub fn meal_details(details: &MealDetails, roster: &[ParticipantProfile]) -> Result<String> {
    let meal = &details.meal;
    let names = name_index(roster);
    let progress = Progress::tally(&details.items);

    let mut out = String::new();
    writeln!(out, "Meal: {} ({})", meal.title, meal.id)?;
    writeln!(out, "Status: {}", meal.status)?;
    writeln!(out, "Scheduled: {}", timestamp(meal.scheduled_at))?;
    if let Some(location) = &meal.location {
        writeln!(out, "Location: {location}")?;
    }
    if let Some(description) = &meal.description {
        writeln!(out, "Description: {description}")?;
    }
    if let Some(completed_at) = meal.completed_at {
        writeln!(out, "Completed: {}", timestamp(completed_at))?;
    }
    out.push('\n');

    out.push_str(&roster_table(roster)?);
    out.push('\n');

    writeln!(
        out,
        "Slots: {}/{} covered, {} cooked",
        progress.covered(),
        progress.total,
        progress.completed
    )?;
    out.push_str(&slot_table(&details.items, &names)?);
    Ok(out)
}

pub fn roster_table(roster: &[ParticipantProfile]) -> Result<String> {
    let name_w = roster
        .iter()
        .map(|p| p.display_name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let mut out = String::new();
    writeln!(out, "{:<name_w$}  {:<8}  {:<8}  USER", "NAME", "ROLE", "RSVP")?;
    for p in roster {
        writeln!(
            out,
            "{:<name_w$}  {:<8}  {:<8}  {}",
            p.display_name,
            p.role.to_string(),
            p.rsvp_status.to_string(),
            p.user_id
        )?;
    }
    Ok(out)
}

pub fn slot_table(items: &[PlanItem], names: &HashMap<Uuid, String>) -> Result<String> {
    if items.is_empty() {
        return Ok("  (no slots yet)\n".to_owned());
    }
    let label_w = items
        .iter()
        .map(|i| i.label().len() + usize::from(i.is_main_dish) * 2)
        .max()
        .unwrap_or(4)
        .max(4);
    let mut out = String::new();
    writeln!(
        out,
        "{:<36}  {:<label_w$}  {:<10}  {:<10}  WHO",
        "ID", "SLOT", "COURSE", "STATUS"
    )?;
    for item in items {
        let label = if item.is_main_dish {
            format!("{} *", item.label())
        } else {
            item.label()
        };
        let holder = match (item.claimed_by, item.assigned_to) {
            (Some(claimer), _) => who(names, claimer),
            (None, Some(assignee)) => format!("{} (assigned)", who(names, assignee)),
            (None, None) => "-".to_owned(),
        };
        writeln!(
            out,
            "{:<36}  {:<label_w$}  {:<10}  {:<10}  {}",
            item.id,
            label,
            item.course.to_string(),
            item.status().to_string(),
            holder
        )?;
    }
    Ok(out)
}

pub fn dish_list(dishes: &[MealDish], names: &HashMap<Uuid, String>) -> Result<String> {
    if dishes.is_empty() {
        return Ok("No dishes cooked yet.\n".to_owned());
    }
    let mut out = String::new();
    for dish in dishes {
        let slot = dish
            .name
            .clone()
            .unwrap_or_else(|| dish.course.to_string());
        let cook = dish
            .claimed_by
            .map(|id| who(names, id))
            .unwrap_or_else(|| "-".to_owned());
        let recipe = dish.recipe_title.as_deref().unwrap_or("no recipe");
        writeln!(
            out,
            "{:<10}  {slot} by {cook} ({recipe}) -> post {}",
            dish.course.to_string(),
            dish.dish_id
        )?;
    }
    Ok(out)
}

fn post_line(post: &Post) -> String {
    let kind = match post.kind {
        PostKind::Meal => "meal",
        PostKind::Dish => "dish",
    };
    match &post.caption {
        Some(caption) => format!("[{kind}] {caption} ({}, {})", post.id, timestamp(post.created_at)),
        None => format!("[{kind}] {} ({})", post.id, timestamp(post.created_at)),
    }
}

/// Feed units, newest first; grouped members are indented under their anchor.
pub fn feed(units: &[FeedUnit<Post>]) -> Result<String> {
    if units.is_empty() {
        return Ok("The feed is empty.\n".to_owned());
    }
    let mut out = String::new();
    for unit in units {
        match unit {
            FeedUnit::Single { item } => {
                writeln!(out, "{}", post_line(item))?;
            }
            FeedUnit::Grouped { members } => {
                writeln!(out, "group of {}:", members.len())?;
                for member in members {
                    writeln!(out, "  {}", post_line(member))?;
                }
            }
        }
    }
    Ok(out)
}
