use crate::cli::{
    actions::Action,
    commands::{self, logging::ARG_VERBOSITY},
    dispatch::handler,
    telemetry,
};
use anyhow::Result;
use tracing::Level;

fn get_verbosity_level(matches: &clap::ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).map_or(0, |&v| v) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Start the CLI
/// # Errors
/// Returns an error if telemetry cannot be initialized or the arguments are invalid
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(get_verbosity_level(&matches))?;

    let action = handler(&matches)?;

    Ok(action)
}
