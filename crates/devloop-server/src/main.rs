use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use devloop_schema::ObservationType;
use devloop_server::logging::{init_tracing, LogFormat};
use devloop_server::{AgentRegistry, AgentUnit, AppConfig, SessionManager, SessionSender};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file (defaults to ./config.toml when present)");

    Command::new("devloop")
        .version(devloop_server::VERSION)
        .about("Agent sessions over a line-delimited JSON connection")
        .arg(
            Arg::new("log-filter")
                .long("log-filter")
                .global(true)
                .default_value("info")
                .help("tracing filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log line format on stderr"),
        )
        .subcommand(
            Command::new("serve-stdio")
                .about("Serve one session: client messages on stdin, agent events on stdout")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("sid")
                        .long("sid")
                        .help("Session id (random when omitted)"),
                ),
        )
        .subcommand(Command::new("schema").about("Print the observation type reference table"))
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration as TOML")
                .arg(config_arg)
                .arg(
                    Arg::new("agents")
                        .long("agents")
                        .action(ArgAction::SetTrue)
                        .help("Also list registered agents"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let filter = matches
        .get_one::<String>("log-filter")
        .map_or("info", String::as_str);
    let format: LogFormat = matches
        .get_one::<String>("log-format")
        .map_or("text", String::as_str)
        .parse()
        .map_err(anyhow::Error::msg)?;
    init_tracing(filter, format);

    match matches.subcommand() {
        Some(("serve-stdio", args)) => {
            let config = AppConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
                .context("failed to load configuration")?;
            let sid = args
                .get_one::<String>("sid")
                .cloned()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            serve_stdio(config, sid).await
        }
        Some(("schema", _)) => {
            print!("{}", ObservationType::reference_table());
            Ok(())
        }
        Some(("config", args)) => {
            let config = AppConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
                .context("failed to load configuration")?;
            print!("{}", config.to_toml_redacted()?);
            if args.get_flag("agents") {
                for name in AgentRegistry::with_defaults().names() {
                    println!("# agent: {name}");
                }
            }
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

async fn serve_stdio(config: AppConfig, sid: String) -> Result<()> {
    let sessions = Arc::new(SessionManager::new());
    let mut outbox = sessions.add_session(&sid);
    let unit = AgentUnit::new(
        sid.clone(),
        sessions.clone(),
        AgentRegistry::with_defaults(),
        Arc::new(config),
    );
    tracing::info!(%sid, "serving session on stdio");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            println!("{message}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(message) => {
                if let Err(e) = unit.handle_client_message(message).await {
                    if !e.is_recoverable() {
                        return Err(e.into());
                    }
                    tracing::warn!(error = %e, "client request failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed client message");
                sessions.send_error(&sid, "Invalid JSON").await?;
            }
        }
    }

    unit.stream().flush().await;
    unit.close();
    sessions.remove_session(&sid);
    writer.await.context("output task failed")?;
    tracing::info!(%sid, "session ended");
    Ok(())
}
