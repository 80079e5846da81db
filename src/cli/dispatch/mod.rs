//! Maps validated CLI arguments to an action.

use crate::cli::{
    actions::{server::Args, Action},
    commands::{
        ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_FRONTEND_ORIGIN, ARG_PIN_GATEWAY_URL, ARG_PORT,
    },
};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let pin_gateway_url = matches
        .get_one::<String>(ARG_PIN_GATEWAY_URL)
        .cloned()
        .context("missing required argument: --pin-gateway-url")?;
    let frontend_origin = matches
        .get_one::<String>(ARG_FRONTEND_ORIGIN)
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty());

    Ok(Action::Server(Args {
        port,
        dsn,
        max_connections,
        pin_gateway_url,
        frontend_origin,
    }))
}
