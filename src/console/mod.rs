//! Administrative console.
//!
//! Flow Overview:
//! 1) [`spawn_stdin`] reads lines from standard input and forwards each one over a channel.
//! 2) [`run`] receives lines, parses them into [`Command`]s and calls the shared gateway.
//! 3) The reply travels back on a oneshot so the reader can print it.
//!
//! The transport (stdin) is separate from the worker, so the worker can be driven by any
//! sender, tests included.

mod command;

pub use command::{Command, ParseError, USAGE};

use secrecy::SecretString;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::admission::{AdmissionRecord, Gateway};

const CHANNEL_CAPACITY: usize = 32;

/// One console line and the slot its reply goes to.
#[derive(Debug)]
pub struct ConsoleRequest {
    pub line: String,
    pub reply: oneshot::Sender<String>,
}

/// Cloneable handle that submits lines to the console worker.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    tx: mpsc::Sender<ConsoleRequest>,
}

impl ConsoleHandle {
    /// Sends `line` to the worker and waits for its reply.
    ///
    /// Returns `None` once the worker has stopped.
    pub async fn submit(&self, line: impl Into<String>) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ConsoleRequest {
                line: line.into(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }
}

/// Starts the console worker and returns the handle used to feed it.
#[must_use]
pub fn spawn(gateway: Arc<Gateway>) -> (ConsoleHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let worker = tokio::spawn(run(gateway, rx));
    (ConsoleHandle { tx }, worker)
}

/// Worker loop: runs until every sender is dropped.
pub async fn run(gateway: Arc<Gateway>, mut rx: mpsc::Receiver<ConsoleRequest>) {
    while let Some(request) = rx.recv().await {
        let reply = execute_line(&gateway, &request.line).await;
        if request.reply.send(reply).is_err() {
            debug!("Console reply dropped, requester went away");
        }
    }
    info!("Console worker stopped");
}

/// Parses and executes a single console line, always producing a printable reply.
pub async fn execute_line(gateway: &Gateway, line: &str) -> String {
    match Command::parse(line) {
        Ok(Command::Empty) => String::new(),
        Ok(command) => execute(gateway, command).await,
        Err(err) => format!("{err}\n{USAGE}"),
    }
}

async fn execute(gateway: &Gateway, command: Command) -> String {
    let result = match command {
        Command::Empty => return String::new(),
        Command::Help => return USAGE.to_string(),
        Command::Accept { username } => gateway.approve(&username).await.map(describe),
        Command::Deny { username, reason } => {
            gateway.deny(&username, &reason).await.map(describe)
        }
        Command::Ban { username, reason } => {
            gateway.ban(&username, reason.as_deref()).await.map(describe)
        }
        Command::Unban { username } => gateway.unban(&username).await.map(describe),
        Command::Rename { old, new } => gateway.rename(&old, &new).await.map(describe),
        Command::Remove { username } => gateway
            .remove(&username)
            .await
            .map(|record| format!("{} removed", record.username)),
        Command::Status { username } => gateway.status(&username).await.map(describe),
        Command::List => {
            let records = gateway.list().await;
            if records.is_empty() {
                return "no admission records".to_string();
            }
            return records
                .into_iter()
                .map(describe)
                .collect::<Vec<_>>()
                .join("\n");
        }
        Command::Passkey { passkey } => gateway
            .rotate_passkey(SecretString::from(passkey))
            .await
            .map(|()| "passkey updated".to_string()),
    };

    result.unwrap_or_else(|err| format!("error ({}): {err}", err.kind()))
}

fn describe(record: AdmissionRecord) -> String {
    match record.reason {
        Some(reason) => format!("{}: {} ({reason})", record.username, record.status),
        None => format!("{}: {}", record.username, record.status),
    }
}

/// Reads standard input line by line and feeds the console worker, printing each reply.
///
/// Stops at end of input or when the worker is gone.
pub fn spawn_stdin(handle: ConsoleHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        serve_lines(
            handle,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await;
    })
}

/// Submits every line of `input` and writes the non-empty replies to `output`.
///
/// Returns at end of input, when the worker is gone, or on the first read/write error.
pub async fn serve_lines<R, W>(handle: ConsoleHandle, input: R, mut output: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Console input closed");
                break;
            }
            Err(err) => {
                error!("Failed to read console input: {err}");
                break;
            }
        };

        let Some(reply) = handle.submit(line).await else {
            break;
        };
        if reply.is_empty() {
            continue;
        }
        if let Err(err) = output.write_all(format!("{reply}\n").as_bytes()).await {
            error!("Failed to write console reply: {err}");
            break;
        }
        if let Err(err) = output.flush().await {
            error!("Failed to flush console reply: {err}");
            break;
        }
    }
}
