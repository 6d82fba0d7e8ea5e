//!
//! mealy shell binary
//! ------------------
//! Interactive front door for the Mealy food-ordering app: landing page, login form and
//! the role-specific dashboards, driven from the keyboard.

use std::sync::mpsc as std_mpsc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use mealy::cli::{parse_command, Reply, Shell};
use mealy::config::ShellConfig;
use mealy::error::AppResult;
use mealy::identity::SessionStore;
use mealy::view::TextRenderer;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--users <file>] [--timeout-ms <ms>] [--no-seed]\n\nFlags:\n  --users <file>       JSON account directory (env MEALY_USERS_FILE); registrations are saved here\n  --timeout-ms <ms>    bound on one login attempt (env MEALY_AUTH_TIMEOUT_MS, default 5000)\n  --no-seed            do not create the demo admin/customer accounts (env MEALY_SEED_DEMO=0)\n  -h, --help           show this help\n\nType `help` inside the shell for commands."
    );
}

enum Input {
    Line(String),
    Closed,
    Failed(String),
}

/// Line editor on its own thread, so a pending login can report while the prompt waits.
/// It reads one line per request sent on the returned sender.
fn spawn_reader() -> (std_mpsc::Sender<()>, mpsc::Receiver<Input>) {
    let (ask_tx, ask_rx) = std_mpsc::channel::<()>();
    let (line_tx, line_rx) = mpsc::channel::<Input>(1);
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                if line_tx.blocking_send(Input::Failed(e.to_string())).is_err() {
                    debug!(target: "mealy", "input channel closed before editor start");
                }
                return;
            }
        };
        while ask_rx.recv().is_ok() {
            let input = match rl.readline("mealy> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = rl.add_history_entry(line.as_str()) {
                            debug!(target: "mealy", "history entry not recorded: {}", e);
                        }
                    }
                    Input::Line(line)
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Input::Closed,
                Err(e) => Input::Failed(e.to_string()),
            };
            let done = !matches!(input, Input::Line(_));
            if line_tx.blocking_send(input).is_err() || done {
                break;
            }
        }
    });
    (ask_tx, line_rx)
}

/// Print a command outcome. `Ok(true)` means quit; non-retryable errors end the shell.
fn report(outcome: AppResult<Reply>) -> Result<bool> {
    match outcome {
        Ok(Reply::Quit) => Ok(true),
        Ok(Reply::Message(msg)) => {
            println!("{}", msg);
            Ok(false)
        }
        Ok(Reply::Nothing) => Ok(false),
        Err(e) if e.is_retryable() => {
            println!("{}", e.message());
            Ok(false)
        }
        Err(e) => {
            warn!(target: "mealy", "fatal: {}", e);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "mealy".to_string() } else { args.remove(0) };
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }

    let cfg = match ShellConfig::load(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&program);
            std::process::exit(2);
        }
    };
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "mealy", "Mealy shell starting: RUST_LOG='{}'", rust_log);

    let mut shell = Shell::from_config(&cfg, SessionStore::global().clone(), TextRenderer::new(std::io::stdout()))?;
    shell.redraw()?;

    let (ask, mut lines) = spawn_reader();
    loop {
        if ask.send(()).is_err() {
            break;
        }
        let input = loop {
            tokio::select! {
                input = lines.recv() => break input,
                Some(done) = shell.settle_login(), if shell.is_login_pending() => {
                    report(done)?;
                }
            }
        };
        let line = match input {
            Some(Input::Line(line)) => line,
            Some(Input::Closed) | None => break,
            Some(Input::Failed(e)) => return Err(anyhow::anyhow!("line editor failed: {}", e)),
        };
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e.message());
                continue;
            }
        };
        if report(shell.execute(cmd).await)? {
            break;
        }
    }

    SessionStore::global().sign_out();
    info!(target: "mealy", "Mealy shell exiting");
    Ok(())
}
