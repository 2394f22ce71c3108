//! Imports the ingredient and tag catalogues from JSON files.

use std::{
    error::Error,
    path::{Path, PathBuf},
};

use clap::Parser;
use serde::{de::DeserializeOwned, Deserialize};

use foodgram::{
    actions::{create_ingredient, create_tag},
    config::Config,
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "load_data", about = "Load ingredients and tags into the database")]
struct Cli {
    /// JSON list of `{name, measurement_unit}` objects
    #[arg(long, default_value = "data/ingredients.json")]
    ingredients: PathBuf,

    /// JSON list of `{name, slug, color}` objects
    #[arg(long, default_value = "data/tags.json")]
    tags: PathBuf,

    /// Skip the tag file
    #[arg(long)]
    skip_tags: bool,
}

#[derive(Deserialize, Debug)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Deserialize, Debug)]
struct TagRecord {
    name: String,
    slug: String,
    color: Option<String>,
}

async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn Error>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let records = serde_json::from_str(&data)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("foodgram=info,load_data=info"))
        .init();

    let args = Cli::parse();
    let state = AppState::connect(Config::from_env()?).await?;
    sqlx::migrate!().run(&state.pool).await?;

    let ingredients: Vec<IngredientRecord> = read_records(&args.ingredients).await?;
    let mut created = 0;
    for record in ingredients.iter() {
        if create_ingredient(record.name.trim(), record.measurement_unit.trim(), &state.pool).await? {
            created += 1;
        }
    }
    log::info!(
        "Ingredients: {created} created, {} already present",
        ingredients.len() - created
    );

    if !args.skip_tags {
        let tags: Vec<TagRecord> = read_records(&args.tags).await?;
        let mut created = 0;
        for record in tags.iter() {
            if create_tag(&record.name, &record.slug, record.color.as_deref(), &state.pool).await? {
                created += 1;
            }
        }
        log::info!("Tags: {created} created, {} already present", tags.len() - created);
    }

    Ok(())
}
