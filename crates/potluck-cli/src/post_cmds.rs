//! Handlers for recipes, dish posts, relationships, and the feed.

use anyhow::Result;
use uuid::Uuid;

use potluck_core::{Engine, feed};
use potluck_db::models::RelationshipKind;

use crate::render;
use crate::{DishCommands, RecipeCommands};

pub async fn run_recipe_command(
    command: RecipeCommands,
    engine: &Engine,
    user: Uuid,
    json: bool,
) -> Result<()> {
    match command {
        RecipeCommands::Add { title } => {
            let title = title.trim();
            if title.is_empty() {
                anyhow::bail!("recipe title must not be blank");
            }
            let recipe = engine.store().insert_recipe(user, title).await?;
            render::emit(json, &recipe, || {
                Ok(format!("Recipe saved: {} ({}).\n", recipe.title, recipe.id))
            })
        }
    }
}

pub async fn run_dish_command(
    command: DishCommands,
    engine: &Engine,
    user: Uuid,
    json: bool,
) -> Result<()> {
    match command {
        DishCommands::Add { caption, recipe } => {
            if let Some(recipe_id) = recipe {
                if engine.store().get_recipe(recipe_id).await?.is_none() {
                    anyhow::bail!("recipe {recipe_id} not found");
                }
            }
            let post = engine
                .store()
                .insert_dish_post(user, recipe, caption.as_deref())
                .await?;
            render::emit(json, &post, || Ok(format!("Dish posted: {}.\n", post.id)))
        }
    }
}

pub async fn run_relate(
    engine: &Engine,
    user: Uuid,
    post_a: Uuid,
    post_b: Uuid,
    kind: RelationshipKind,
    remove: bool,
    json: bool,
) -> Result<()> {
    let store = engine.store();
    if remove {
        let removed = feed::unrelate(store, user, post_a, post_b, kind).await?;
        return render::emit(json, &removed, || {
            Ok(if removed {
                format!("Unrelated {post_a} and {post_b}.\n")
            } else {
                format!("{post_a} and {post_b} were not related ({kind}).\n")
            })
        });
    }
    let edge = feed::relate(store, user, post_a, post_b, kind).await?;
    render::emit(json, &edge, || {
        Ok(format!("Related {} and {} ({}).\n", edge.post_a, edge.post_b, edge.kind))
    })
}

pub async fn run_feed(engine: &Engine, limit: i64, json: bool) -> Result<()> {
    let units = feed::assemble(engine.store(), limit).await?;
    render::emit(json, &units, || render::feed(&units))
}
