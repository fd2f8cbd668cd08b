mod cache_cmds;
mod config;
mod generate_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mealgen_db::pool;

use config::MealgenConfig;

#[derive(Parser)]
#[command(name = "mealgen", about = "Staged LLM pipeline for weekly meal plans")]
struct Cli {
    /// Database URL (overrides MEALGEN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a mealgen config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/mealgen")]
        db_url: String,
        /// Oracle API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the mealgen database
    DbInit,
    /// Generate a weekly meal plan from a profile
    Generate {
        /// Path to the profile JSON file
        #[arg(long)]
        profile: PathBuf,
        /// Path to a generation options JSON file
        #[arg(long)]
        options: Option<PathBuf>,
        /// User the plan belongs to (defaults to the nil UUID)
        #[arg(long)]
        user: Option<String>,
        /// Store the plan in the database
        #[arg(long)]
        save: bool,
        /// Write the plan as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-derive the prep schedule of a stored plan
    RegenPrep {
        /// Plan ID
        plan_id: String,
        /// User who owns the plan
        #[arg(long)]
        user: String,
    },
    /// Nutrition cache inspection
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Canonical ingredient administration
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cached nutrition for one or more ingredient names
    Lookup {
        /// Ingredient names (normalized before lookup)
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum IngredientCommands {
    /// Soft-delete an ingredient so the pipeline never recreates it
    Delete {
        /// Ingredient name
        name: String,
    },
}

/// Execute the `mealgen init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
            max_connections: None,
        },
        oracle: config::OracleSection {
            api_key: api_key.clone(),
            ..Default::default()
        },
        models: config::ModelsSection::default(),
    };

    config::save_config(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    match api_key {
        Some(key) => println!("  oracle.api_key = {}", config::mask_secret(&key)),
        None => println!("  oracle.api_key not set (use MEALGEN_ORACLE_API_KEY)"),
    }
    println!();
    println!("Next: run `mealgen db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `mealgen db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = MealgenConfig::resolve(cli_db_url)?;

    println!("Initializing mealgen database...");

    match pool::ensure_database_exists(&resolved.db_config).await? {
        pool::Bootstrap::Created => println!("  created database"),
        pool::Bootstrap::AlreadyExisted => println!("  database already exists"),
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for count in &counts {
        println!("  {}: {} rows", count.table, count.rows);
    }

    db_pool.close().await;

    println!("mealgen db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            force,
        } => {
            cmd_init(&db_url, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Generate {
            profile,
            options,
            user,
            save,
            output,
        } => {
            let resolved = MealgenConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let args = generate_cmd::GenerateArgs {
                profile,
                options,
                user,
                save,
                output,
            };
            let result = generate_cmd::run_generate(&db_pool, &resolved, args).await;
            db_pool.close().await;
            result?;
        }
        Commands::RegenPrep { plan_id, user } => {
            let resolved = MealgenConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = generate_cmd::run_regen_prep(&db_pool, &resolved, &plan_id, &user).await;
            db_pool.close().await;
            result?;
        }
        Commands::Cache { command } => {
            let resolved = MealgenConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = cache_cmds::run_cache_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Ingredient { command } => {
            let resolved = MealgenConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = cache_cmds::run_ingredient_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
