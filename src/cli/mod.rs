use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::usage::PlanTier;

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "open-ai", alias = "openai")]
    OpenAI,
    #[value(alias = "anthropic")]
    Anthropic,
}

#[derive(Parser, Debug)]
#[command(name="vibe_appgen", version, about="AI web-app generator backend: prompt/patch pipeline, projects, usage and deploys")]
pub struct Args {
    /// TOML config file; env vars override it
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(long)]
        database: Option<String>,
    },
    /// Interactive generation against a local directory
    Chat {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long, value_enum)]
        provider: Option<ProviderKind>,

        #[arg(long, default_value = "react")]
        language: String,

        /// Image URL attached to the first turn
        #[arg(long)]
        image: Option<String>,

        /// Free-text project summary sent with every turn
        #[arg(long)]
        summary: Option<String>,

        /// Ask for JSON patches against the loaded files instead of whole files
        #[arg(long, default_value_t = false)]
        edit: bool,

        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        save_transcripts: bool,
    },
    /// Set a user's plan tier in the database
    Subscription {
        #[arg(long)]
        user: String,

        #[arg(long, value_enum)]
        tier: PlanTier,

        #[arg(long)]
        database: Option<String>,
    },
}
