mod display;
mod prompt;

use std::sync::Arc;

use anyhow::Context;
use display::{CliProgress, print_groups};
use mass_merge::{
    BulkOperation, Command, GitHub, Workflow, parse_args, resolve_credentials,
    web::{self, AppState},
    workflow::fetch_groups,
};
use prompt::TerminalSelector;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn selection_question(operation: &BulkOperation) -> String {
    match operation {
        BulkOperation::Merge { .. } => "Which updates do you want to merge?".to_string(),
        BulkOperation::Label(label) => format!("Which updates do you want to label '{label}'?"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = match parse_args(std::env::args()) {
        Ok(settings) => settings,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let credentials = resolve_credentials(&settings.token_file)?;
    let forge = GitHub::new(credentials, settings.endpoint.clone(), &settings.api_base)
        .context("Failed to create GitHub client")?;
    let mut stdout = std::io::stdout();

    match settings.command.clone() {
        Command::Run(operation) => {
            let mut selector = TerminalSelector::new(selection_question(&operation));
            let workflow = Workflow::new(&forge, settings.workflow_options(operation));
            workflow
                .run(&mut selector, &CliProgress::new(), &mut stdout)
                .await?;
        }
        Command::List => {
            let groups = fetch_groups(
                &forge,
                settings.strategy,
                &settings.identities,
                &CliProgress::new(),
            )
            .await?;
            print_groups(&groups, &mut stdout)?;
        }
        Command::Serve { bind } => {
            let state = AppState::new(Arc::new(forge), settings.strategy, settings.identities);
            web::serve(Arc::new(state), bind).await?;
        }
    }

    Ok(())
}
