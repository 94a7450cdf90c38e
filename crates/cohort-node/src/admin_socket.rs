//! Unix socket server for admin commands.
//!
//! Newline-delimited JSON, one command per line, one response per line.
//! Used by the `cohort-admin` CLI to set reputation levels, close deals
//! and trigger a settlement sweep by hand.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::sweeper::{SweepReport, Sweeper};
use cohort_tiers::ReputationLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Set a participant's reputation level (`none` clears it)
    SetReputation { participant_id: String, level: String },
    GetReputation { participant_id: String },
    /// Stop a deal from accepting new groups
    CloseDeal { deal_id: u64 },
    /// Run one settlement sweep now
    Sweep,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Level { level: Option<ReputationLevel> },
    Report { report: SweepReport },
    Pong,
}

impl From<Error> for AdminResponse {
    fn from(e: Error) -> Self {
        AdminResponse::Error {
            error: e.to_string(),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    engine: Arc<Engine>,
    sweeper: Arc<Sweeper>,
    socket_path: PathBuf,
}

impl AdminSocket {
    pub fn new(engine: Arc<Engine>, sweeper: Arc<Sweeper>, socket_path: PathBuf) -> Self {
        Self {
            engine,
            sweeper,
            socket_path,
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // stale socket from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&self.engine);
                    let sweeper = Arc::clone(&self.sweeper);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, engine, sweeper).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }
}

async fn handle_connection(
    stream: UnixStream,
    engine: Arc<Engine>,
    sweeper: Arc<Sweeper>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => {
                let engine = Arc::clone(&engine);
                let sweeper = Arc::clone(&sweeper);
                tokio::task::spawn_blocking(move || execute_command(cmd, &engine, &sweeper))
                    .await
                    .unwrap_or_else(|e| AdminResponse::Error {
                        error: format!("command task failed: {}", e),
                    })
            }
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn execute_command(cmd: AdminCommand, engine: &Engine, sweeper: &Sweeper) -> AdminResponse {
    let storage = engine.storage();
    match cmd {
        AdminCommand::SetReputation {
            participant_id,
            level,
        } => {
            let result = if level.eq_ignore_ascii_case("none") {
                storage.clear_reputation(&participant_id)
            } else {
                match level.parse::<ReputationLevel>() {
                    Ok(level) => storage.set_reputation(&participant_id, level),
                    Err(e) => Err(Error::InvalidInput(e.to_string())),
                }
            };
            match result {
                Ok(()) => {
                    tracing::info!(participant_id = %participant_id, level = %level, "reputation set");
                    AdminResponse::Ok {
                        message: format!("{} is now {}", participant_id, level.to_lowercase()),
                    }
                }
                Err(e) => e.into(),
            }
        }

        AdminCommand::GetReputation { participant_id } => {
            match storage.get_reputation(&participant_id) {
                Ok(level) => AdminResponse::Level { level },
                Err(e) => e.into(),
            }
        }

        AdminCommand::CloseDeal { deal_id } => match engine.close_deal(deal_id) {
            Ok(deal) => AdminResponse::Ok {
                message: format!("Closed deal {} ({})", deal.id, deal.title),
            },
            Err(e) => e.into(),
        },

        AdminCommand::Sweep => match sweeper.sweep_once() {
            Ok(report) => AdminResponse::Report { report },
            Err(e) => e.into(),
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}
