use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("TURNSTILE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_log_level() {
        let command = with_args(Command::new("test"));
        for (input, expected) in [("error", 0), ("WARN", 1), ("info", 2), ("3", 3), ("trace", 4)] {
            temp_env::with_vars([("TURNSTILE_LOG_LEVEL", Some(input))], || {
                let matches = command.clone().get_matches_from(vec!["test"]);
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    Some(expected),
                    "level {input}"
                );
            });
        }
    }

    #[test]
    fn test_invalid_log_level() {
        temp_env::with_vars([("TURNSTILE_LOG_LEVEL", Some("chatty"))], || {
            let result = with_args(Command::new("test")).try_get_matches_from(vec!["test"]);
            assert!(result.is_err());
        });
    }
}
