//! REPL for rwctl
use anyhow::Result;

use replwire::{Callbacks, Client, ContextId, NamespaceSpec};
use std::path::PathBuf;

use crate::editor::{self, LineEditor};
use rustyline::error::ReadlineError;

/// Context name requests from the REPL are tagged with
const REPL_CONTEXT: &str = "repl";

/// Prefix of the command switching the current namespace
const NS_COMMAND: &str = ":ns";

/// Entrypoint for running REPL.
/// Returns Err if REPL terminated with error
pub(crate) async fn run(client: &Client, mut ns: NamespaceSpec) -> Result<()> {
    let mut rl = editor::editor()?;
    let history = history_file();
    let ctx = ContextId::from(REPL_CONTEXT);

    load_history(&mut rl, &history);

    loop {
        let line = match rl.readline(&prompt(&ns)) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                line
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };
        let code = line.trim();
        if code.is_empty() {
            continue;
        }
        if let Some(rest) = code.strip_prefix(NS_COMMAND) {
            match rest.parse::<NamespaceSpec>() {
                Ok(spec) => ns = spec,
                Err(e) => eprintln!("{e}"),
            }
            continue;
        }

        let ticket = match client.send_auto(&ctx, &ns, code, Callbacks::new()).await {
            Ok(ticket) => ticket,
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        };
        // Failures are reported through the frontend
        if ticket.await.is_ok() {
            println!("ok");
        }
    }

    save_history(&mut rl, &history);
    Ok(())
}

/// Prompt showing the current namespace
fn prompt(ns: &NamespaceSpec) -> String {
    match ns.resolve() {
        Ok(path) => format!("{}> ", path.segments().join(".")),
        Err(_) => "?> ".to_string(),
    }
}

/// Path to file to use for history
fn history_file() -> Option<PathBuf> {
    let dir = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(dirs::home_dir)?;
    Some(dir.as_path().join(".rwctl_history"))
}

fn load_history(rl: &mut LineEditor, history: &Option<PathBuf>) {
    if let Some(history) = history {
        if let Err(e) = rl.load_history(&history) {
            eprintln!("Failed to load {} - {}", history.to_string_lossy(), e);
        }
    }
}

fn save_history(rl: &mut LineEditor, history: &Option<PathBuf>) {
    if let Some(history) = history {
        if let Err(e) = rl.save_history(&history) {
            eprintln!("Failed to save {} - {}", history.to_string_lossy(), e);
        }
    }
}
