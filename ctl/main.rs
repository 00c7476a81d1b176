#![forbid(unsafe_code)]

//! `agent-callroom-ctl` — operator CLI companion for `agent-callroom`.
//!
//! Sends requests to the server's HTTP API and prints the JSON response.
//! The operator token is read from `CALLROOM_OPERATOR_TOKEN` when set.

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(
    name = "agent-callroom-ctl",
    about = "Operator CLI for the agent-callroom server",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the agent-callroom HTTP API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report orchestrator and provider health.
    Health,

    /// Show the booking behind a meeting link token.
    Resolve {
        /// Meeting-access token.
        token: String,
    },

    /// List active session records.
    List,

    /// Start a session for a booking.
    Start {
        /// Booking ID.
        booking_id: String,
    },

    /// Fetch a fresh join credential for a booking's active session.
    Rejoin {
        /// Booking ID.
        booking_id: String,
    },

    /// Show remote liveness of a session record.
    Status {
        /// Session record ID.
        session_id: String,
    },

    /// End a session record.
    End {
        /// Session record ID.
        session_id: String,
    },

    /// Register an agent.
    CreateAgent {
        /// Display name spoken by the agent.
        name: String,

        /// Knowledge context handed to the provider.
        #[arg(long, default_value = "")]
        knowledge: String,

        /// Join window in hours (1-168); server default when omitted.
        #[arg(long)]
        link_expiry_hours: Option<i64>,
    },

    /// Delete an agent with its bookings and session history.
    DeleteAgent {
        /// Agent ID.
        agent_id: String,
    },

    /// Book a conversation and print its meeting token.
    CreateBooking {
        /// Agent ID.
        agent_id: String,

        /// Counterpart display name.
        #[arg(long)]
        name: String,

        /// Counterpart email.
        #[arg(long)]
        email: String,

        /// Scheduled start, RFC 3339 (e.g. 2026-05-01T14:00:00Z).
        #[arg(long)]
        scheduled_at: String,
    },

    /// Move a booking to a new status.
    SetStatus {
        /// Booking ID.
        booking_id: String,

        /// Target status.
        #[arg(value_parser = ["pending", "confirmed", "completed", "cancelled", "expired"])]
        status: String,
    },

    /// List every session record of a booking.
    History {
        /// Booking ID.
        booking_id: String,
    },
}

impl Command {
    fn method_and_path(&self) -> (Method, String) {
        match self {
            Self::Health => (Method::GET, "/health".into()),
            Self::Resolve { token } => (Method::GET, format!("/join/{token}")),
            Self::List => (Method::GET, "/sessions".into()),
            Self::Start { booking_id } => (Method::POST, format!("/bookings/{booking_id}/session")),
            Self::Rejoin { booking_id } => (Method::GET, format!("/bookings/{booking_id}/session")),
            Self::Status { session_id } => (Method::GET, format!("/sessions/{session_id}/status")),
            Self::End { session_id } => (Method::POST, format!("/sessions/{session_id}/end")),
            Self::CreateAgent { .. } => (Method::POST, "/agents".into()),
            Self::DeleteAgent { agent_id } => (Method::DELETE, format!("/agents/{agent_id}")),
            Self::CreateBooking { .. } => (Method::POST, "/bookings".into()),
            Self::SetStatus { booking_id, .. } => {
                (Method::PUT, format!("/bookings/{booking_id}/status"))
            }
            Self::History { booking_id } => (Method::GET, format!("/bookings/{booking_id}/sessions")),
        }
    }

    /// JSON request body, for commands that send one.
    fn body(&self) -> Option<Value> {
        match self {
            Self::CreateAgent {
                name,
                knowledge,
                link_expiry_hours,
            } => Some(json!({
                "name": name,
                "knowledge": knowledge,
                "link_expiry_hours": link_expiry_hours,
            })),
            Self::CreateBooking {
                agent_id,
                name,
                email,
                scheduled_at,
            } => Some(json!({
                "agent_id": agent_id,
                "counterpart_name": name,
                "counterpart_email": email,
                "scheduled_at": scheduled_at,
            })),
            Self::SetStatus { status, .. } => Some(json!({ "status": status })),
            _ => None,
        }
    }
}

fn main() {
    let args = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(send_request(&args)) {
        Ok((status, Value::Null)) if status.is_success() => println!("ok"),
        Ok((status, body)) if status.is_success() => {
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        }
        Ok((status, body)) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            eprintln!("Error ({status}): {message}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("Failed to reach server: {err}");
            eprintln!("Is agent-callroom running at '{}'?", args.url);
            std::process::exit(1);
        }
    }
}

/// Send the command to the API and decode the JSON body.
async fn send_request(
    args: &Cli,
) -> std::result::Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let (method, path) = args.command.method_and_path();
    let url = format!("{}{path}", args.url.trim_end_matches('/'));

    let mut request = client.request(method, url);
    if let Some(body) = args.command.body() {
        request = request.json(&body);
    }
    if let Some(token) = std::env::var("CALLROOM_OPERATOR_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
    {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    Ok((status, body))
}
