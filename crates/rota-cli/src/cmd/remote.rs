//! Commands that drive a running `rota serve` over HTTP.

use crate::output::{print_json, print_revoke_failures};
use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Show the engine state, role, schedule and roster
    Status,

    /// Re-read the rotation file and re-resolve the role and roster
    Reload,

    /// Hand the duty role to the next participant now
    Rotate,

    /// Revoke the duty role from everyone in the roster
    Clear,

    /// Re-resolve roster participants against the role service
    Refresh,

    /// Add a participant to the roster
    Add {
        /// Participant id
        id: String,
        /// Roster position (default: the end)
        #[arg(long)]
        position: Option<usize>,
    },

    /// Remove a participant who is not on duty
    Remove {
        /// Participant id
        id: String,
    },

    /// Move a participant to another roster position
    Move {
        /// Participant id
        id: String,
        /// New roster position
        position: usize,
    },

    /// Hand the duty role to the participant at a roster position
    SetIndex {
        index: usize,
        /// Only rewrite the stored index; takes effect on the next reload
        #[arg(long)]
        force: bool,
    },

    /// Change the weekly rotation time
    Schedule {
        /// Day of week, 0 = Sunday .. 6 = Saturday
        #[arg(long)]
        day: Option<u8>,
        /// Hour, 0-23
        #[arg(long)]
        hour: Option<u8>,
        /// Minute, 0-59
        #[arg(long)]
        minute: Option<u8>,
    },
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

struct Client {
    base: String,
}

impl Client {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn send(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{path}", self.base);
        let request = ureq::request(method, &url);
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => Ok(response.into_json()?),
            Err(ureq::Error::Status(code, response)) => {
                let body: Value = response.into_json().unwrap_or(Value::Null);
                let message = body["error"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| "request failed".to_string());
                bail!("{message} (HTTP {code})")
            }
            Err(e) => Err(anyhow!(e).context(format!("cannot reach rota server at {}", self.base))),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(url: &str, cmd: RemoteCommand, json: bool) -> Result<()> {
    let client = Client::new(url);

    let response = match &cmd {
        RemoteCommand::Status => client.send("GET", "/api/status", None)?,
        RemoteCommand::Reload => client.send("POST", "/api/reload", None)?,
        RemoteCommand::Rotate => client.send("POST", "/api/rotate", None)?,
        RemoteCommand::Clear => client.send("POST", "/api/clear", None)?,
        RemoteCommand::Refresh => client.send("POST", "/api/refresh", None)?,
        RemoteCommand::Add { id, position } => client.send(
            "POST",
            "/api/members",
            Some(json!({ "id": id, "position": position })),
        )?,
        RemoteCommand::Remove { id } => {
            client.send("DELETE", &format!("/api/members/{id}"), None)?
        }
        RemoteCommand::Move { id, position } => client.send(
            "PUT",
            &format!("/api/members/{id}/position"),
            Some(json!({ "position": position })),
        )?,
        RemoteCommand::SetIndex { index, force } => client.send(
            "PUT",
            "/api/index",
            Some(json!({ "index": index, "force": force })),
        )?,
        RemoteCommand::Schedule { day, hour, minute } => {
            if day.is_none() && hour.is_none() && minute.is_none() {
                bail!("nothing to change: pass --day, --hour or --minute");
            }
            client.send(
                "PUT",
                "/api/schedule",
                Some(json!({ "day": day, "hour": hour, "minute": minute })),
            )?
        }
    };

    if json {
        return print_json(&response);
    }
    print_human(&cmd, &response);
    Ok(())
}

fn print_human(cmd: &RemoteCommand, response: &Value) {
    let text = |key: &str| response[key].as_str().unwrap_or_default().to_string();
    match cmd {
        RemoteCommand::Status => println!("{}", text("summary")),
        RemoteCommand::Reload => println!("Loaded: {}", text("summary")),
        RemoteCommand::Rotate => {
            print_revoke_failures(response);
            println!(
                "On duty: {} (index {})",
                text("on_duty"),
                response["index"]
            );
        }
        RemoteCommand::Clear => {
            print_revoke_failures(response);
            println!("Duty role cleared");
        }
        RemoteCommand::Refresh => match response["unresolved"].as_array() {
            Some(ids) if !ids.is_empty() => {
                for id in ids {
                    println!("unresolved: {}", id.as_str().unwrap_or("?"));
                }
                println!("Engine is invalid until the roster is fixed and reloaded");
            }
            _ => println!("All roster participants resolved"),
        },
        RemoteCommand::Add { id, .. } => {
            println!("Added {id} at position {}", response["position"])
        }
        RemoteCommand::Remove { id } => println!("Removed {id}"),
        RemoteCommand::Move { id, position } => {
            println!("Moved {id} to position {position} (index {})", response["index"])
        }
        RemoteCommand::SetIndex { .. } => {
            if response["kind"] == "forced" {
                println!(
                    "Stored index set to {}; run `rota reload` to apply",
                    response["index"]
                );
            } else {
                print_revoke_failures(response);
                println!(
                    "On duty: {} (index {})",
                    text("on_duty"),
                    response["index"]
                );
            }
        }
        RemoteCommand::Schedule { .. } => {
            println!("Schedule: {}", text("summary"));
            if let Some(next) = response["next_rotation"].as_str() {
                println!("Next rotation: {next}");
            }
        }
    }
}
