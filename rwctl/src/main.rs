use anyhow::{anyhow, Context, Result};
use clap::{arg, command, value_parser, ArgMatches, Command};

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use replwire::{Callbacks, Client, Config, ContextId, ErrorDisplay, NamespaceSpec, Session, Ticket};

mod editor;
mod frontend;
mod repl;

use frontend::TermFrontend;

/// Context name requests from the command line are tagged with
const CLI_CONTEXT: &str = "rwctl";

/// The clap CLI interface
fn cli() -> Command {
    command!()
        .arg(arg!(--host <HOST> "Host of interpreter control server").global(true))
        .arg(
            arg!(--port <PORT> "Port of interpreter control server")
                .value_parser(value_parser!(u16))
                .global(true),
        )
        .arg(
            arg!(--config <FILE> "Path to config file")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            arg!(-n --namespace <NAMESPACE> "Dotted namespace to evaluate in, e.g. Foo.Bar")
                .value_parser(value_parser!(NamespaceSpec))
                .global(true),
        )
        .arg(arg!(--notify "Report failures as short notifications").global(true))
        .subcommand(
            Command::new("eval")
                .about("Evaluate CODE, or stdin if CODE is -")
                .arg(arg!(<CODE> "Code to evaluate"))
                .arg(arg!(--staged "Send through a staged scratch file")),
        )
        .subcommand(
            Command::new("stage")
                .about("Evaluate CODE through a staged scratch file")
                .arg(arg!(<CODE> "Code to evaluate")),
        )
        .subcommand(
            Command::new("load")
                .about("Load and evaluate FILE")
                .arg(arg!(<FILE> "Source file").value_parser(value_parser!(PathBuf))),
        )
        .subcommand(
            Command::new("activate")
                .about("Activate package environment at DIR")
                .arg(arg!(<DIR> "Project directory").value_parser(value_parser!(PathBuf))),
        )
        .subcommand(Command::new("repl").about("Run an interactive REPL (default)"))
}

/// Build config from config file and command line overrides
fn config(args: &ArgMatches) -> Result<Config> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().with_context(|| "Failed to load config".to_string())?,
    };
    if let Some(host) = args.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = args.get_one::<u16>("port") {
        config.port = *port;
    }
    if args.get_flag("notify") {
        config.error_display = ErrorDisplay::Notification;
    }
    Ok(config)
}

/// Read CODE argument, with `-` standing for stdin
fn code_arg(args: &ArgMatches) -> Result<String> {
    let code = args
        .get_one::<String>("CODE")
        .ok_or_else(|| anyhow!("CODE is required"))?;
    if code != "-" {
        return Ok(code.clone());
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .with_context(|| "Failed to read stdin".to_string())?;
    Ok(buf)
}

/// Wait for ticket, turning a failed evaluation into an error
async fn finish(ticket: Ticket) -> Result<()> {
    let id = ticket.id().clone();
    match ticket.await {
        Ok(()) => {
            debug!("request {id} succeeded");
            Ok(())
        }
        Err(failure) => Err(anyhow!("request {id} failed - {}", failure.message())),
    }
}

/// Run a single subcommand against client
async fn run_cmd(client: &Client, ns: &NamespaceSpec, cmd: &str, args: &ArgMatches) -> Result<()> {
    let ctx = ContextId::from(CLI_CONTEXT);
    let ticket = match cmd {
        "eval" if args.get_flag("staged") => {
            client
                .send_text_staged(&ctx, ns, &code_arg(args)?, Callbacks::new())
                .await?
        }
        "eval" => {
            client
                .send_auto(&ctx, ns, &code_arg(args)?, Callbacks::new())
                .await?
        }
        "stage" => {
            client
                .send_text_staged(&ctx, ns, &code_arg(args)?, Callbacks::new())
                .await?
        }
        "load" => {
            let file = args
                .get_one::<PathBuf>("FILE")
                .ok_or_else(|| anyhow!("FILE is required"))?;
            let file = file
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", file.display()))?;
            client.send_file(&ctx, ns, &file, Callbacks::new()).await?
        }
        "activate" => {
            let dir = args
                .get_one::<PathBuf>("DIR")
                .ok_or_else(|| anyhow!("DIR is required"))?;
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", dir.display()))?;
            client.activate_project(&ctx, &dir, Callbacks::new()).await?
        }
        _ => return Err(anyhow!("Unknown command {cmd}")),
    };
    finish(ticket).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = cli().get_matches();

    let config = config(&args)?;
    let address = config.address();
    let ns = args
        .get_one::<NamespaceSpec>("namespace")
        .cloned()
        .unwrap_or_default();

    let session = Session::new(config, Arc::new(TermFrontend));
    let client = session
        .client()
        .await
        .with_context(|| format!("Failed to connect to {address}"))?;
    debug!("Connected to interpreter: {:?}", client);

    let res = match args.subcommand() {
        Some(("repl", _)) | None => repl::run(client, ns).await,
        Some((cmd, sub_args)) => run_cmd(client, &ns, cmd, sub_args).await,
    };

    session.shutdown().await;
    res
}
