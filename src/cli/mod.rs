//! CLI module for the churn prediction service
//!
//! Provides subcommands:
//! - `serve`: run the HTTP API
//! - `init-db`: create the PostgreSQL database if it does not exist

pub mod init_db;
pub mod serve;

use clap::{Parser, Subcommand};

/// Churn Prediction Service - scores customers with trained churn models
#[derive(Parser)]
#[command(name = "churn-prediction-service")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,

    /// Create the configured database if it is missing
    InitDb(init_db::InitDbArgs),
}
