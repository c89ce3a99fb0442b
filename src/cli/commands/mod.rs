use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub mod logging;

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_DEFAULT_PASSKEY: &str = "default-passkey";
pub const ARG_CONSOLE: &str = "console";
pub const ARG_EXPOSE_PASSKEY: &str = "expose-passkey";

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("turnstile")
        .about("Username admission and passkey gate")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TURNSTILE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("SQLite connection string, example: sqlite://turnstile.db (in-memory when omitted)")
                .env("TURNSTILE_DSN"),
        )
        .arg(
            Arg::new(ARG_DEFAULT_PASSKEY)
                .long("default-passkey")
                .help("Passkey stored on first start when none exists yet")
                .default_value(crate::admission::DEFAULT_PASSKEY)
                .env("TURNSTILE_DEFAULT_PASSKEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_CONSOLE)
                .long("console")
                .help("Read administrative commands from stdin")
                .env("TURNSTILE_CONSOLE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_EXPOSE_PASSKEY)
                .long("expose-passkey")
                .help("Serve the current passkey on GET /v1/passkey")
                .env("TURNSTILE_EXPOSE_PASSKEY")
                .action(ArgAction::SetTrue),
        );

    logging::with_args(command)
}
