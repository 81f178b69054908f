//! Handlers for `potluck meal` subcommands.

use anyhow::Result;
use uuid::Uuid;

use potluck_core::Engine;
use potluck_db::models::{MealChanges, NewMeal};

use crate::MealCommands;
use crate::render;

/// Dispatch a `MealCommands` variant to the appropriate handler.
pub async fn run_meal_command(
    command: MealCommands,
    engine: &Engine,
    user: Uuid,
    json: bool,
) -> Result<()> {
    match command {
        MealCommands::Create {
            title,
            at,
            location,
            description,
        } => {
            let meal = engine
                .meals
                .create(
                    user,
                    NewMeal {
                        title,
                        description,
                        location,
                        scheduled_at: at,
                    },
                )
                .await?;
            render::emit(json, &meal, || {
                Ok(format!(
                    "Meal created.\n\n  Meal ID:   {}\n  Title:     {}\n  Scheduled: {}\n",
                    meal.id,
                    meal.title,
                    render::timestamp(meal.scheduled_at)
                ))
            })
        }
        MealCommands::Show { meal_id, dishes } => {
            let roster = engine.participants.roster(meal_id, user).await?;
            if dishes {
                let cooked = engine.items.dishes(meal_id, user).await?;
                let names = render::name_index(&roster);
                return render::emit(json, &cooked, || render::dish_list(&cooked, &names));
            }
            let details = engine.meals.get(meal_id, user).await?;
            render::emit(json, &details, || render::meal_details(&details, &roster))
        }
        MealCommands::List => {
            let meals = engine.meals.list_for_user(user).await?;
            render::emit(json, &meals, || render::meal_list(&meals))
        }
        MealCommands::Update {
            meal_id,
            title,
            at,
            location,
            description,
        } => {
            let changes = MealChanges {
                title,
                description,
                location,
                scheduled_at: at,
            };
            let meal = engine.meals.update(meal_id, user, changes).await?;
            render::emit(json, &meal, || Ok(format!("Meal {} updated.\n", meal.id)))
        }
        MealCommands::Complete { meal_id } => {
            let completion = engine.meals.complete(meal_id, user).await?;
            render::emit(json, &completion, || {
                let mut out = format!(
                    "Meal {} completed; posted to the feed as {}.\n",
                    completion.meal.id, completion.post.id
                );
                if completion.discarded_invitations > 0 {
                    out.push_str(&format!(
                        "Discarded {} unanswered invitation(s).\n",
                        completion.discarded_invitations
                    ));
                }
                Ok(out)
            })
        }
        MealCommands::Delete { meal_id } => {
            let deletion = engine.meals.delete(meal_id, user).await?;
            render::emit(json, &deletion, || {
                Ok(format!(
                    "Meal {} deleted. {} dish post(s) kept in the feed.\n",
                    deletion.meal_id,
                    deletion.detached_dishes.len()
                ))
            })
        }
    }
}
