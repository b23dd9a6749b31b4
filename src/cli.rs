//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// LLM Request Gateway - one front door for OpenRouter, DeepSeek and Anthropic
#[derive(Parser, Debug)]
#[command(name = "llm-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the health of every registered provider (default)
    Health,

    /// List the models of a provider
    Models {
        /// Provider name
        provider: String,
    },

    /// Send a prompt through the gateway
    Chat(ChatArgs),

    /// Load and validate the configuration without contacting providers
    Validate,
}

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send
    pub message: String,

    /// Model to use; `vendor/model` ids are routed by vendor
    #[arg(short = 'M', long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Stream the response
    #[arg(long)]
    pub stream: bool,

    /// Temperature (0.0 to 2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Subject the request is rate limited under
    #[arg(long, default_value = "cli")]
    pub subject: String,

    /// Show token usage
    #[arg(long)]
    pub show_usage: bool,
}
