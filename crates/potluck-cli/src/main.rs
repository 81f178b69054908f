mod config;
mod guest_cmds;
mod item_cmds;
mod meal_cmds;
mod post_cmds;
mod render;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use potluck_core::{Engine, PgStore};
use potluck_db::models::{Course, RelationshipKind, RsvpStatus};
use potluck_db::pool;
use potluck_db::queries::posts as post_queries;

use config::PotluckConfig;

#[derive(Parser)]
#[command(name = "potluck", about = "Plan shared meals: hosts, guests, and the dishes they bring")]
struct Cli {
    /// Database URL (overrides POTLUCK_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Act as this user (overrides POTLUCK_USER_ID env var)
    #[arg(long, global = true)]
    user: Option<Uuid>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a potluck config file with a fresh user identity (no database required)
    Init {
        /// Your display name
        #[arg(long)]
        name: String,
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/potluck")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database, run migrations, and register the configured user
    DbInit,
    /// Meal management
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Invitations, RSVPs, and the host role
    Guest {
        #[command(subcommand)]
        command: GuestCommands,
    },
    /// Dish slots
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Dish posts
    Dish {
        #[command(subcommand)]
        command: DishCommands,
    },
    /// Relate two posts so the feed shows them together
    Relate {
        post_a: Uuid,
        post_b: Uuid,
        /// same_meal or paired_dish
        #[arg(long, default_value = "paired_dish")]
        kind: RelationshipKind,
        /// Remove the relationship instead
        #[arg(long)]
        remove: bool,
    },
    /// Show recent posts, related posts grouped together
    Feed {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum MealCommands {
    /// Plan a new meal; you become its host
    Create {
        title: String,
        /// When the meal happens (RFC 3339, e.g. 2026-11-01T18:00:00Z)
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a meal with its roster and slots
    Show {
        meal_id: Uuid,
        /// List cooked dishes instead of slots
        #[arg(long)]
        dishes: bool,
    },
    /// List the meals you belong to
    List,
    /// Change a meal's descriptive fields (host only)
    Update {
        meal_id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark a meal as happened and publish it to the feed (host only)
    Complete { meal_id: Uuid },
    /// Delete a meal; cooked dishes stay in the feed (host only)
    Delete { meal_id: Uuid },
}

#[derive(Subcommand)]
pub enum GuestCommands {
    /// Invite users to a meal (host only)
    Invite {
        meal_id: Uuid,
        #[arg(required = true)]
        users: Vec<Uuid>,
    },
    /// Answer an invitation: accepted, maybe, or declined
    Respond { meal_id: Uuid, response: RsvpStatus },
    /// Remove a participant and release their slots (host only)
    Remove { meal_id: Uuid, user: Uuid },
    /// Hand the host role to an accepted guest (host only)
    TransferHost { meal_id: Uuid, user: Uuid },
    /// List a meal's participants
    List { meal_id: Uuid },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Add a dish slot (host only)
    Add {
        meal_id: Uuid,
        course: Course,
        #[arg(long)]
        name: Option<String>,
        /// Mark as a main dish
        #[arg(long)]
        main: bool,
        /// Assign to an accepted guest right away
        #[arg(long)]
        assign: Option<Uuid>,
    },
    /// Add every slot from a TOML menu file (host only)
    Import { meal_id: Uuid, file: String },
    /// Assign a slot to a guest (host only)
    Assign { item_id: Uuid, user: Uuid },
    /// Clear a slot's assignment (host only)
    Unassign { item_id: Uuid },
    /// Take a slot
    Claim { item_id: Uuid },
    /// Take a slot and name the recipe in one step
    Volunteer { item_id: Uuid, recipe_id: Uuid },
    /// Give a slot back
    Unclaim { item_id: Uuid },
    /// Attach or replace the recipe on your slot
    Recipe { item_id: Uuid, recipe_id: Uuid },
    /// Link the dish you cooked to your slot
    Complete { item_id: Uuid, dish_id: Uuid },
    /// Delete a slot nobody has claimed (host only)
    Remove { item_id: Uuid },
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// Save a recipe you can attach to slots
    Add { title: String },
}

#[derive(Subcommand)]
pub enum DishCommands {
    /// Post a dish you cooked
    Add {
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        recipe: Option<Uuid>,
    },
}

/// Execute the `potluck init` command: write config file.
fn cmd_init(name: &str, db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if name.trim().is_empty() {
        anyhow::bail!("display name must not be blank");
    }

    let user_id = Uuid::new_v4();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
        },
        user: config::UserSection {
            id: user_id,
            display_name: name.trim().to_owned(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  user.id = {user_id}");
    println!();
    println!("Next: run `potluck db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `potluck db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &PotluckConfig) -> anyhow::Result<()> {
    println!("Initializing potluck database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    if let (Some(id), Some(name)) = (resolved.user_id, resolved.display_name.as_deref()) {
        post_queries::upsert_profile(&db_pool, id, name).await?;
        println!("Registered {name} ({id}).");
    }

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("potluck db-init complete.");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init {
        name,
        db_url,
        force,
    } = &cli.command
    {
        return cmd_init(name, db_url, *force);
    }

    let resolved = PotluckConfig::resolve(cli.database_url.as_deref(), cli.user)?;
    if let Commands::DbInit = cli.command {
        return cmd_db_init(&resolved).await;
    }

    let user = resolved.require_user()?;
    tracing::debug!(db = ?resolved.db_config.database_name(), user = %user, "resolved configuration");
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let engine = Engine::new(Arc::new(PgStore::new(db_pool.clone())));
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { .. } | Commands::DbInit => Ok(()),
        Commands::Meal { command } => meal_cmds::run_meal_command(command, &engine, user, json).await,
        Commands::Guest { command } => {
            guest_cmds::run_guest_command(command, &engine, user, json).await
        }
        Commands::Item { command } => item_cmds::run_item_command(command, &engine, user, json).await,
        Commands::Recipe { command } => {
            post_cmds::run_recipe_command(command, &engine, user, json).await
        }
        Commands::Dish { command } => post_cmds::run_dish_command(command, &engine, user, json).await,
        Commands::Relate {
            post_a,
            post_b,
            kind,
            remove,
        } => post_cmds::run_relate(&engine, user, post_a, post_b, kind, remove, json).await,
        Commands::Feed { limit } => post_cmds::run_feed(&engine, limit, json).await,
    };

    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_meal_create() {
        let cli = Cli::try_parse_from([
            "potluck",
            "meal",
            "create",
            "Friday Tacos",
            "--at",
            "2026-11-01T18:00:00Z",
            "--location",
            "Rooftop",
        ])
        .unwrap();
        match cli.command {
            Commands::Meal {
                command:
                    MealCommands::Create {
                        title, at, location, ..
                    },
            } => {
                assert_eq!(title, "Friday Tacos");
                assert_eq!(at.to_rfc3339(), "2026-11-01T18:00:00+00:00");
                assert_eq!(location.as_deref(), Some("Rooftop"));
            }
            _ => panic!("expected meal create"),
        }
    }

    #[test]
    fn parses_enums_from_text() {
        let meal = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "potluck",
            "item",
            "add",
            &meal.to_string(),
            "dessert",
            "--main",
        ])
        .unwrap();
        match cli.command {
            Commands::Item {
                command:
                    ItemCommands::Add {
                        meal_id,
                        course,
                        main,
                        ..
                    },
            } => {
                assert_eq!(meal_id, meal);
                assert_eq!(course, Course::Dessert);
                assert!(main);
            }
            _ => panic!("expected item add"),
        }

        let cli = Cli::try_parse_from(["potluck", "guest", "respond", &meal.to_string(), "maybe"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Guest {
                command: GuestCommands::Respond {
                    response: RsvpStatus::Maybe,
                    ..
                }
            }
        ));
    }

    #[test]
    fn rejects_unknown_course_and_bad_ids() {
        let meal = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["potluck", "item", "add", &meal, "brunch"]).is_err());
        assert!(Cli::try_parse_from(["potluck", "item", "claim", "not-a-uuid"]).is_err());
        assert!(Cli::try_parse_from(["potluck", "guest", "invite", &meal]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let user = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "potluck",
            "feed",
            "--limit",
            "5",
            "--json",
            "--user",
            &user.to_string(),
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.user, Some(user));
        assert!(matches!(cli.command, Commands::Feed { limit: 5 }));
    }

    #[test]
    fn relate_defaults_to_paired_dish() {
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["potluck", "relate", &a, &b]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Relate {
                kind: RelationshipKind::PairedDish,
                remove: false,
                ..
            }
        ));
    }
}
