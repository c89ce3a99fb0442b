use thiserror::Error;

pub const USAGE: &str = "\
commands:
  /accept <user>           approve a pending user
  /deny <user> <reason>    deny a pending user
  /ban <user> [reason]     ban an approved user
  /unban <user>            lift a ban
  /rename <old> <new>      move a record to a new username
  /remove <user>           delete a record
  /status <user>           show a record
  /list                    show all records
  /passkey <new>           replace the shared passkey
  /help                    show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Accept { username: String },
    Deny { username: String, reason: String },
    Ban { username: String, reason: Option<String> },
    Unban { username: String },
    Rename { old: String, new: String },
    Remove { username: String },
    Status { username: String },
    List,
    Passkey { passkey: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{command}: missing {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{0}: too many arguments")]
    TooManyArguments(&'static str),
}

/// Splits off the first whitespace-delimited word, returning it and the trimmed rest.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(index) => (&input[..index], input[index..].trim()),
        None => (input, ""),
    }
}

fn required<'a>(
    input: &'a str,
    command: &'static str,
    argument: &'static str,
) -> Result<(&'a str, &'a str), ParseError> {
    let (word, rest) = split_word(input);
    if word.is_empty() {
        return Err(ParseError::MissingArgument { command, argument });
    }
    Ok((word, rest))
}

fn single(input: &str, command: &'static str) -> Result<String, ParseError> {
    let (username, rest) = required(input, command, "<user>")?;
    if !rest.is_empty() {
        return Err(ParseError::TooManyArguments(command));
    }
    Ok(username.to_string())
}

impl Command {
    /// Parses one console line.
    ///
    /// # Errors
    /// Returns `ParseError` for unknown commands or missing/extra arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let (name, args) = split_word(line.trim());

        match name {
            "" => Ok(Self::Empty),
            "/help" => Ok(Self::Help),
            "/list" => {
                if args.is_empty() {
                    Ok(Self::List)
                } else {
                    Err(ParseError::TooManyArguments("/list"))
                }
            }
            "/accept" => Ok(Self::Accept {
                username: single(args, "/accept")?,
            }),
            "/unban" => Ok(Self::Unban {
                username: single(args, "/unban")?,
            }),
            "/remove" => Ok(Self::Remove {
                username: single(args, "/remove")?,
            }),
            "/status" => Ok(Self::Status {
                username: single(args, "/status")?,
            }),
            "/deny" => {
                let (username, reason) = required(args, "/deny", "<user>")?;
                if reason.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "/deny",
                        argument: "<reason>",
                    });
                }
                Ok(Self::Deny {
                    username: username.to_string(),
                    reason: reason.to_string(),
                })
            }
            "/ban" => {
                let (username, reason) = required(args, "/ban", "<user>")?;
                Ok(Self::Ban {
                    username: username.to_string(),
                    reason: (!reason.is_empty()).then(|| reason.to_string()),
                })
            }
            "/rename" => {
                let (old, rest) = required(args, "/rename", "<old>")?;
                let new = single(rest, "/rename").map_err(|err| match err {
                    ParseError::MissingArgument { command, .. } => ParseError::MissingArgument {
                        command,
                        argument: "<new>",
                    },
                    other => other,
                })?;
                Ok(Self::Rename {
                    old: old.to_string(),
                    new,
                })
            }
            "/passkey" => {
                if args.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "/passkey",
                        argument: "<new>",
                    });
                }
                Ok(Self::Passkey {
                    passkey: args.to_string(),
                })
            }
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}
