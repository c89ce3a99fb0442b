//! # Turnstile (username admission and passkey gate)
//!
//! Clients submit a username for admission; an administrator approves, denies, bans or unbans
//! it over HTTP or from an interactive console. A single shared passkey gates a privileged
//! action and can be verified and rotated.
//!
//! ## Admission states
//!
//! - **pending**: created by `register`.
//! - **approved**: from pending (`approve`) or banned (`unban`).
//! - **denied**: from pending only, with a reason.
//! - **banned**: from approved only, with a reason (or a default one).
//!
//! Unknown usernames are reported as not found, never as denied.
//!
//! ## Consistency
//!
//! Every mutation, from either the HTTP handlers or the console worker, runs through one
//! [`admission::Gateway`] under one lock, and is written to the durable store before the
//! in-memory view changes.

pub mod admission;
pub mod api;
pub mod cli;
pub mod console;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
