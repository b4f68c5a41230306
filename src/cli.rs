use anyhow::Context;
use clap::{ArgAction, Parser};
use lsp_types::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::scenario::DriverOptions;

const DEFAULT_SERVER: &[&str] = &["cargo", "run", "--bin", "lsp-server"];

#[derive(Debug, Clone)]
pub struct Config {
    pub server_command: String,
    pub server_args: Vec<String>,
    pub document_uri: String,
    pub language_id: String,
    pub root_uri: Option<String>,
    pub settle: Duration,
    pub max_items: usize,
    pub completion_attempts: u32,
    pub retry_backoff: Duration,
    pub exit_grace: Duration,
    pub scenario_file: Option<PathBuf>,
}

impl Config {
    pub fn driver_options(&self) -> anyhow::Result<DriverOptions> {
        let document_uri = Url::parse(&self.document_uri)
            .with_context(|| format!("invalid document uri {:?}", self.document_uri))?;
        let root_uri = self
            .root_uri
            .as_deref()
            .map(|uri| Url::parse(uri).with_context(|| format!("invalid root uri {:?}", uri)))
            .transpose()?;

        Ok(DriverOptions {
            document_uri,
            language_id: self.language_id.clone(),
            root_uri,
            settle: self.settle,
            max_items: self.max_items,
            completion_attempts: self.completion_attempts,
            retry_backoff: self.retry_backoff,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "completion_probe")]
#[command(about = "Drive completion scenarios against a language server over stdio", long_about = None)]
pub struct Cli {
    /// Server command and its arguments (after `--`); defaults to `cargo run --bin lsp-server`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    server: Vec<String>,
    /// URI of the document the scenarios are typed into
    #[arg(long, default_value = "file:///test.bsl")]
    pub uri: String,
    #[arg(long, default_value = "bsl")]
    pub language_id: String,
    #[arg(long)]
    pub root_uri: Option<String>,
    /// Wait after didOpen before the first completion request
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
    /// Completion items printed per scenario
    #[arg(long, default_value_t = 5)]
    pub max_items: usize,
    /// Completion requests per scenario while its expected label is missing
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub completion_attempts: u32,
    #[arg(long, default_value_t = 250)]
    pub retry_backoff_ms: u64,
    /// Time the server gets to exit after `exit` before it is killed
    #[arg(long, default_value_t = 1000)]
    pub exit_grace_ms: u64,
    /// JSON file with the scenarios to run instead of the built-in ones
    #[arg(long)]
    pub scenarios: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Config {
        let mut server = if self.server.is_empty() {
            DEFAULT_SERVER.iter().map(|s| s.to_string()).collect()
        } else {
            self.server
        };
        let server_command = server.remove(0);

        Config {
            server_command,
            server_args: server,
            document_uri: self.uri,
            language_id: self.language_id,
            root_uri: self.root_uri,
            settle: Duration::from_millis(self.settle_ms),
            max_items: self.max_items,
            completion_attempts: self.completion_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            exit_grace: Duration::from_millis(self.exit_grace_ms),
            scenario_file: self.scenarios,
        }
    }
}
