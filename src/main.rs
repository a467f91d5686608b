mod agent;
mod capability;
mod catalog;
mod channel;
mod clock;
mod config;
mod console;
mod controller;
mod engine;
mod haptics;
mod poll_loop;
mod shell;
mod shutdown;
mod status;
mod wake;

#[cfg(test)]
mod fakes;

use crate::agent::{Agent, AgentSettings, Collaborators};
use crate::catalog::ActionCatalog;
use crate::channel::{HttpChannel, RemoteChannel};
use crate::controller::Controller;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "buzzlink", version, about = "Send buzz actions and listen for them")]
struct Cli {
    /// Config file (default: $BUZZLINK_CONFIG or ~/.config/buzzlink/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the listener until Ctrl-C or SIGTERM (default)
    Listen,
    /// Send one action to every listener
    Send {
        /// Action key, e.g. a, b, c, d
        key: String,
    },
    /// Interactive sender with listener start/stop
    Console,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    log::info!("buzzlink v{} starting...", env!("CARGO_PKG_VERSION"));

    let cfg = config::Config::load(cli.config.as_deref());
    log::info!("Endpoint: {}", cfg.endpoint);

    let catalog = Arc::new(ActionCatalog::from_table(&cfg.patterns));
    if catalog.is_empty() {
        log::error!("No valid patterns configured");
        std::process::exit(1);
    }

    let channel: Arc<dyn RemoteChannel> = Arc::new(HttpChannel::new(
        cfg.endpoint.clone(),
        cfg.poll_timeout(),
        cfg.submit_timeout(),
    ));
    let controller = Controller::new(Arc::clone(&channel), Arc::clone(&catalog));

    match cli.command.unwrap_or(Command::Listen) {
        Command::Send { key } => {
            let outcome = tokio::task::spawn_blocking(move || controller.send_blocking(&key))
                .await
                .unwrap_or_else(|e| {
                    log::error!("Send task failed: {e}");
                    std::process::exit(1);
                });
            println!("{}", outcome.summary());
            if outcome.result.is_err() {
                std::process::exit(1);
            }
        }
        Command::Listen => {
            let agent = build_agent(&cfg, channel, catalog);
            if let Err(e) = shutdown::listen(agent, shutdown::wait_for_signal()).await {
                log::error!("{e}");
                std::process::exit(1);
            }
        }
        Command::Console => {
            let agent = build_agent(&cfg, channel, Arc::clone(&catalog));
            console::run(agent, controller, catalog, shutdown::wait_for_signal()).await;
        }
    }
}

fn build_agent(
    cfg: &config::Config,
    channel: Arc<dyn RemoteChannel>,
    catalog: Arc<ActionCatalog>,
) -> Arc<Agent> {
    Arc::new(Agent::new(
        Collaborators::from_config(cfg, channel),
        catalog,
        AgentSettings::from_config(cfg),
    ))
}
