//! cohort-admin CLI tool
//!
//! Operator commands for a running cohort-node.
//!
//! Usage:
//!   cohort-admin set-reputation <participant_id> <level|none>
//!   cohort-admin get-reputation <participant_id>
//!   cohort-admin close-deal <deal_id>
//!   cohort-admin sweep
//!   cohort-admin ping

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    SetReputation { participant_id: String, level: String },
    GetReputation { participant_id: String },
    CloseDeal { deal_id: u64 },
    Sweep,
    Ping,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Level { level: Option<String> },
    Report { report: serde_json::Value },
    Pong,
}

fn print_usage() {
    eprintln!("cohort-admin - Operate a Cohort node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cohort-admin set-reputation <participant_id> <level>  Set level (newbie..legend, or none)");
    eprintln!("  cohort-admin get-reputation <participant_id>          Show a participant's level");
    eprintln!("  cohort-admin close-deal <deal_id>                     Stop a deal taking new groups");
    eprintln!("  cohort-admin sweep                                    Run a settlement sweep now");
    eprintln!("  cohort-admin ping                                     Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COHORT_SOCKET  Path to admin socket (default: ./cohort-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("COHORT_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./cohort-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to cohort-node at {:?}: {}\n\
             Is the cohort-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn require<'a>(args: &'a [String], index: usize, what: &str) -> &'a str {
    match args.get(index) {
        Some(arg) => arg,
        None => {
            eprintln!("Error: {} requires a {} argument", args[1], what);
            std::process::exit(1);
        }
    }
}

fn parse_command(args: &[String]) -> AdminCommand {
    match args[1].as_str() {
        "set-reputation" => AdminCommand::SetReputation {
            participant_id: require(args, 2, "participant_id").to_string(),
            level: require(args, 3, "level").to_string(),
        },
        "get-reputation" => AdminCommand::GetReputation {
            participant_id: require(args, 2, "participant_id").to_string(),
        },
        "close-deal" => {
            let raw = require(args, 2, "deal_id");
            match raw.parse() {
                Ok(deal_id) => AdminCommand::CloseDeal { deal_id },
                Err(_) => {
                    eprintln!("Error: invalid deal_id: {}", raw);
                    std::process::exit(1);
                }
            }
        }
        "sweep" => AdminCommand::Sweep,
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = parse_command(&args);

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::Level { level } => {
                println!("{}", level.as_deref().unwrap_or("(none)"));
            }
            AdminResponse::Report { report } => {
                let pretty = serde_json::to_string_pretty(&report).unwrap_or_default();
                println!("{}", pretty);
            }
            AdminResponse::Pong => {
                println!("pong - cohort-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
