//! Line-based chat over Murmur.
//!
//! ```text
//! chat server [--port 4444]
//! chat client --username NAME [--host localhost] [--port 4444] [--json]
//! ```

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use murmur::prelude::*;
use murmur::DEFAULT_PORT;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "chat", about = "A tiny TCP chat server and client", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "MURMUR_LOG",
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the chat server
    Server(ServerArgs),
    /// Join a chat server and talk from stdin
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ServerArgs {
    #[arg(long, short, env = "MURMUR_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[derive(Args, Debug)]
struct ClientArgs {
    #[arg(long, short, env = "MURMUR_USERNAME", help = "Name to chat as")]
    username: String,

    #[arg(long, env = "MURMUR_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, short, env = "MURMUR_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Print inbound messages as JSON lines"
    )]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    murmur::logging::init(&cli.log);

    let result = match cli.command {
        Command::Server(args) => run_server(args).await,
        Command::Client(args) => run_client(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(args: ServerArgs) -> Result<(), MurmurError> {
    let server = ChatServer::start(args.port).await?;
    eprintln!("listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn run_client(args: ClientArgs) -> Result<(), MurmurError> {
    let (session, mut inbox) =
        ClientSession::connect(&args.host, args.port, &args.username).await?;

    if session.online_users().is_empty() {
        println!("You're the first one here.");
    } else {
        println!("Online: {}", session.online_users().join(", "));
    }

    let json = args.json;
    let mut printer = tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            print_message(&msg, json);
        }
        eprintln!("disconnected");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let sent = session.send(&line).await?;
                    if !json {
                        print_message(&sent, false);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            },
            // Server went away; nothing left to talk to.
            _ = &mut printer => return Ok(()),
        }
    }

    session.close().await
}

fn print_message(msg: &ChatMessage, json: bool) {
    if json {
        match serde_json::to_string(msg) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "message not serializable"),
        }
        return;
    }

    let when = DateTime::<Utc>::from_timestamp(msg.timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| msg.timestamp.to_string());
    println!("{when} {}: {}", msg.from, msg.payload);
}
