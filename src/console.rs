/// Interactive console: the foreground control surface.
///
///   a / b / c / d   send that action to every listener
///   start / stop    run or halt the local listener
///   status          print the listener status line
///   help / quit
///
/// Sends run in the background; their outcomes and listener status changes
/// are printed as they arrive, so typing is never blocked on the network.
/// Quit, end of input and the shutdown signal all stop the listener first.

use crate::agent::Agent;
use crate::catalog::{normalize_key, ActionCatalog};
use crate::controller::Controller;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(String),
    Start,
    Stop,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str, catalog: &ActionCatalog) -> Self {
        let word = normalize_key(line);
        match word.as_str() {
            "" => ConsoleCommand::Empty,
            "start" => ConsoleCommand::Start,
            "stop" => ConsoleCommand::Stop,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            key if catalog.contains(key) => ConsoleCommand::Send(key.to_string()),
            _ => ConsoleCommand::Unknown(line.trim().to_string()),
        }
    }
}

fn print_help(catalog: &ActionCatalog) {
    let keys: Vec<&str> = catalog.keys().collect();
    println!("Actions: {}", keys.join(" "));
    println!("Commands: start  stop  status  help  quit");
}

pub async fn run(
    agent: Arc<Agent>,
    controller: Controller,
    catalog: Arc<ActionCatalog>,
    shutdown: impl Future<Output = ()>,
) {
    drive(BufReader::new(tokio::io::stdin()), agent, controller, catalog, shutdown).await
}

async fn drive<R: AsyncBufRead + Unpin>(
    input: R,
    agent: Arc<Agent>,
    controller: Controller,
    catalog: Arc<ActionCatalog>,
    shutdown: impl Future<Output = ()>,
) {
    let mut lines = input.lines();
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();
    let mut status_rx = agent.subscribe();
    tokio::pin!(shutdown);

    print_help(&catalog);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("Failed to read stdin: {e}");
                        break;
                    }
                };
                match ConsoleCommand::parse(&line, &catalog) {
                    ConsoleCommand::Send(key) => controller.send(&key, outcome_tx.clone()),
                    ConsoleCommand::Start => {
                        let a = Arc::clone(&agent);
                        match tokio::task::spawn_blocking(move || a.start()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => println!("Start failed: {e}"),
                            Err(e) => log::error!("Start task failed: {e}"),
                        }
                    }
                    ConsoleCommand::Stop => {
                        let a = Arc::clone(&agent);
                        if let Err(e) = tokio::task::spawn_blocking(move || a.stop()).await {
                            log::error!("Stop task failed: {e}");
                        }
                    }
                    ConsoleCommand::Status => println!("{} ({})", agent.status(), agent.state()),
                    ConsoleCommand::Help => print_help(&catalog),
                    ConsoleCommand::Quit => break,
                    ConsoleCommand::Empty => {}
                    ConsoleCommand::Unknown(s) => println!("Unknown command '{s}' (type 'help')"),
                }
            }
            Some(outcome) = outcomes.recv() => println!("{}", outcome.summary()),
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = status_rx.borrow_and_update().clone();
                println!("[listener] {text}");
            }
        }
    }

    let a = Arc::clone(&agent);
    if let Err(e) = tokio::task::spawn_blocking(move || a.stop()).await {
        log::error!("Stop task failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::fakes::{fake_agent, CountingWakeLock, ScriptedChannel};

    fn controller(catalog: &Arc<ActionCatalog>) -> Controller {
        Controller::new(Arc::new(ScriptedChannel::new(vec![])), Arc::clone(catalog))
    }

    #[test]
    fn parses_keywords_and_actions() {
        let catalog = ActionCatalog::default();
        assert_eq!(ConsoleCommand::parse("B\n", &catalog), ConsoleCommand::Send("b".into()));
        assert_eq!(ConsoleCommand::parse(" start ", &catalog), ConsoleCommand::Start);
        assert_eq!(ConsoleCommand::parse("STOP", &catalog), ConsoleCommand::Stop);
        assert_eq!(ConsoleCommand::parse("status", &catalog), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("?", &catalog), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("q", &catalog), ConsoleCommand::Quit);
        assert_eq!(ConsoleCommand::parse("   ", &catalog), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("zap", &catalog), ConsoleCommand::Unknown("zap".into()));
    }

    #[tokio::test]
    async fn shutdown_signal_stops_running_listener() {
        let wake = Arc::new(CountingWakeLock::new());
        let agent = fake_agent(wake.clone());
        let catalog = Arc::new(ActionCatalog::default());
        agent.start().unwrap();

        // Keep the writer so input never ends on its own.
        let (_keyboard, input) = tokio::io::duplex(64);
        drive(BufReader::new(input), Arc::clone(&agent), controller(&catalog), catalog, async {}).await;

        assert_eq!(agent.state(), AgentState::Stopped);
        assert_eq!(wake.released(), 1);
    }

    #[tokio::test]
    async fn start_then_quit_releases_listener() {
        let wake = Arc::new(CountingWakeLock::new());
        let agent = fake_agent(wake.clone());
        let catalog = Arc::new(ActionCatalog::default());

        let input = BufReader::new(&b"start\nstatus\nquit\n"[..]);
        drive(input, Arc::clone(&agent), controller(&catalog), catalog, std::future::pending()).await;

        assert_eq!(agent.state(), AgentState::Stopped);
        assert_eq!(wake.acquired(), 1);
        assert_eq!(wake.released(), 1);
    }
}
