/*
[INPUT]:  CLI arguments, YAML configuration file, WORKFLOW__* environment
[OUTPUT]: Command result as JSON on stdout, forced logout notice on stderr
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or output handling
*/

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use console::style;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use workflow_cli::{Cli, CliConfig, commands};
use workflow_client::{AuthEvent, FileStore, SessionContext, SessionState, WorkflowClient};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = CliConfig::load(args.config_path.as_deref()).context("load config")?;
    init_tracing(args.log_level.as_deref().unwrap_or(&config.log_level))?;

    debug!(
        base_url = %config.base_url,
        storage = %config.storage_path.display(),
        "configuration loaded"
    );

    let store = Arc::new(FileStore::new(&config.storage_path));
    let context = Arc::new(SessionContext::new(store));
    let client = WorkflowClient::with_context(config.client_config(), context)
        .context("build workflow client")?;
    let state = SessionState::new(Arc::new(client));
    let mut events = state.client().subscribe();
    let listener = state.spawn_signal_listener();

    let session = state.initialize();
    info!(authenticated = session.authenticated, "session restored");

    let result = commands::execute(&state, args.command).await;
    report_forced_logout(&mut events);
    listener.abort();

    let output = result?;
    let rendered = serde_json::to_string_pretty(&output).context("render output")?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn report_forced_logout(events: &mut Receiver<AuthEvent>) {
    while let Ok(event) = events.try_recv() {
        if let AuthEvent::ForcedLogout { reason } = event {
            eprintln!(
                "{} session expired ({reason}); run `workflow-cli login` again",
                style("logged out:").yellow().bold()
            );
        }
    }
}
