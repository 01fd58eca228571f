//! Init-db command - creates the PostgreSQL database if it does not exist

use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::storage::{
    create_database_if_missing, database_name, resolve_database_url, validate_database_name,
};

#[derive(Debug, Args)]
pub struct InitDbArgs {
    /// Database to create; defaults to the one named in the connection URL
    #[arg(long)]
    pub name: Option<String>,
}

/// Create the target database on the configured server
pub async fn run(args: InitDbArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let url = resolve_database_url(config.database.url.as_deref(), &config.database.secrets_dir)?;
    let name = target_name(&args, &url)?;

    if create_database_if_missing(&url, &name).await? {
        info!("Database '{}' created", name);
    } else {
        info!("Database '{}' already exists", name);
    }

    Ok(())
}

fn target_name(args: &InitDbArgs, url: &str) -> anyhow::Result<String> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => database_name(url)?,
    };
    validate_database_name(&name)?;
    Ok(name)
}
