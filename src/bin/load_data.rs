use std::{fs, path::PathBuf};

use clap::Parser;
use foodgram::{
    config::Config,
    database::actions::{ingredients::create_ingredient, tags::create_tag},
};
use serde::Deserialize;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

#[derive(Parser)]
#[command(name = "load_data")]
#[command(about = "Import ingredients and tags into the Foodgram database", long_about = None)]
struct Cli {
    /// JSON array of `{"name", "measurement_unit"}`
    #[arg(short, long)]
    ingredients: Option<PathBuf>,

    /// JSON array of `{"name", "slug"}`
    #[arg(short, long)]
    tags: Option<PathBuf>,
}

#[derive(Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Deserialize)]
struct TagRecord {
    name: String,
    slug: String,
}

fn read_records<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<Vec<T>, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("Malformed {}: {e}", path.display()))
}

async fn load_ingredients(pool: &Pool<Postgres>, records: Vec<IngredientRecord>) -> usize {
    let mut added = 0;

    for record in records {
        match create_ingredient(pool, &record.name, &record.measurement_unit).await {
            Ok(true) => {
                log::info!("Added ingredient {} ({})", record.name, record.measurement_unit);
                added += 1;
            }
            Ok(false) => log::warn!("Skipped existing ingredient {}", record.name),
            Err(e) => log::error!("Failed to add ingredient {}: {e}", record.name),
        }
    }
    added
}

async fn load_tags(pool: &Pool<Postgres>, records: Vec<TagRecord>) -> usize {
    let mut added = 0;

    for record in records {
        match create_tag(pool, &record.name, &record.slug).await {
            Ok(true) => {
                log::info!("Added tag {} ({})", record.name, record.slug);
                added += 1;
            }
            Ok(false) => log::warn!("Skipped existing tag {}", record.name),
            Err(e) => log::error!("Failed to add tag {}: {e}", record.name),
        }
    }
    added
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();

    if cli.ingredients.is_none() && cli.tags.is_none() {
        log::warn!("Nothing to load; pass --ingredients and/or --tags");
        return Ok(());
    }

    // Parse everything before touching the database.
    let ingredients = cli
        .ingredients
        .as_ref()
        .map(read_records::<IngredientRecord>)
        .transpose()?;
    let tags = cli.tags.as_ref().map(read_records::<TagRecord>).transpose()?;

    let config = Config::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    if let Some(records) = ingredients {
        let total = records.len();
        let added = load_ingredients(&pool, records).await;
        log::info!("Ingredients: {added} of {total} added");
    }

    if let Some(records) = tags {
        let total = records.len();
        let added = load_tags(&pool, records).await;
        log::info!("Tags: {added} of {total} added");
    }

    Ok(())
}
