use crate::cli::{
    actions::{server, Action},
    commands::{ARG_CONSOLE, ARG_DEFAULT_PASSKEY, ARG_DSN, ARG_EXPOSE_PASSKEY, ARG_PORT},
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let default_passkey = matches
        .get_one::<String>(ARG_DEFAULT_PASSKEY)
        .filter(|passkey| !passkey.is_empty())
        .ok_or_else(|| anyhow!("--default-passkey must not be empty"))?;

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
        dsn: matches
            .get_one::<String>(ARG_DSN)
            .map(|dsn| dsn.trim().to_string())
            .filter(|dsn| !dsn.is_empty()),
        default_passkey: SecretString::from(default_passkey.as_str()),
        console: matches.get_flag(ARG_CONSOLE),
        expose_passkey: matches.get_flag(ARG_EXPOSE_PASSKEY),
    }))
}
