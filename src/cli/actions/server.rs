use crate::{
    admission::Gateway,
    api::{self, ApiConfig},
    console, storage,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub default_passkey: SecretString,
    pub console: bool,
    pub expose_passkey: bool,
}

/// Open the store, load the gateway and serve HTTP (plus the console when asked).
/// # Errors
/// Returns an error if the store cannot be opened or the server fails
pub async fn execute(args: Args) -> Result<()> {
    let store = storage::connect(args.dsn.as_deref())
        .await
        .context("Failed to open storage")?;

    info!("Using {} storage backend", store.backend());

    let gateway = Arc::new(
        Gateway::load(store, args.default_passkey)
            .await
            .context("Failed to load admission records")?,
    );

    if args.console {
        let (handle, _worker) = console::spawn(Arc::clone(&gateway));
        console::spawn_stdin(handle);
        info!("Administrative console attached to stdin");
    }

    if args.expose_passkey {
        warn!("GET /v1/passkey is enabled and returns the current passkey");
    }

    api::new(
        args.port,
        gateway,
        ApiConfig {
            expose_passkey: args.expose_passkey,
        },
    )
    .await
}
