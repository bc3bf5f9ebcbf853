use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use url::Url;

use crate::{
    github::{DEFAULT_API_BASE, DEFAULT_GRAPHQL_ENDPOINT},
    group::{AutomationIdentities, GroupKeyStrategy},
    workflow::{BulkOperation, WorkflowOptions},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Parser)]
#[command(name = "mass-merge")]
#[command(about = "Merge dependency update pull requests in bulk, grouped by update")]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// File holding a GitHub token; used when it exists
    #[arg(long, env = "MASS_MERGE_TOKEN_FILE", default_value = "token.txt", global = true)]
    token_file: PathBuf,

    /// GraphQL endpoint
    #[arg(
        long,
        env = "MASS_MERGE_ENDPOINT",
        default_value = DEFAULT_GRAPHQL_ENDPOINT,
        global = true
    )]
    endpoint: Url,

    /// REST API base, used to look up the current user
    #[arg(long, env = "MASS_MERGE_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    api_base: Url,

    /// How pull requests are grouped
    #[arg(long, value_enum, default_value_t, global = true)]
    group_by: GroupKeyStrategy,

    /// Author login treated as a dependency bot (can be specified multiple
    /// times; defaults to dependabot and dependabot-preview)
    #[arg(long = "bot", value_name = "LOGIN", global = true)]
    bots: Vec<String>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Choose groups and merge their pull requests (default)
    Merge {
        /// Send every merge in a single request
        #[arg(long)]
        batch: bool,
    },
    /// Choose groups and add a label to their pull requests
    Label {
        /// Name of an existing repository label
        label: String,
    },
    /// Print the groups without prompting
    List,
    /// Run the web interface
    Serve {
        #[arg(long, env = "MASS_MERGE_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(BulkOperation),
    List,
    Serve { bind: SocketAddr },
}

/// Parsed command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token_file: PathBuf,
    pub endpoint: Url,
    pub api_base: Url,
    pub strategy: GroupKeyStrategy,
    pub identities: AutomationIdentities,
    pub command: Command,
}

impl Settings {
    pub fn workflow_options(&self, operation: BulkOperation) -> WorkflowOptions {
        WorkflowOptions {
            strategy: self.strategy,
            identities: self.identities.clone(),
            operation,
        }
    }
}

/// Parses command-line arguments into [`Settings`].
///
/// Help and version requests come back as a [`clap::Error`] inside the
/// returned error so the caller decides how to exit.
pub fn parse_args<I, T>(args: I) -> Result<Settings>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;

    let identities = if cli.bots.is_empty() {
        AutomationIdentities::default()
    } else {
        AutomationIdentities::new(cli.bots)
    };

    let command = match cli.command {
        None => Command::Run(BulkOperation::default()),
        Some(CliCommand::Merge { batch }) => Command::Run(BulkOperation::Merge { batch }),
        Some(CliCommand::Label { label }) => {
            if label.trim().is_empty() {
                anyhow::bail!("Label name must not be empty");
            }
            Command::Run(BulkOperation::Label(label))
        }
        Some(CliCommand::List) => Command::List,
        Some(CliCommand::Serve { bind }) => Command::Serve { bind },
    };

    Ok(Settings {
        token_file: cli.token_file,
        endpoint: cli.endpoint,
        api_base: cli.api_base,
        strategy: cli.group_by,
        identities,
        command,
    })
}
