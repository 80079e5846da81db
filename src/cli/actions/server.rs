use crate::{api, cli::telemetry};
use anyhow::Result;
use std::fmt;
use tracing::info;
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub max_connections: u32,
    pub pin_gateway_url: String,
    pub frontend_origin: Option<String>,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &redact_dsn(&self.dsn))
            .field("max_connections", &self.max_connections)
            .field("pin_gateway_url", &self.pin_gateway_url)
            .field("frontend_origin", &self.frontend_origin)
            .finish()
    }
}

/// Run the HTTP server until shutdown.
/// # Errors
/// Returns an error if the server fails to start
pub async fn execute(args: Args) -> Result<()> {
    info!(
        port = args.port,
        dsn = %redact_dsn(&args.dsn),
        max_connections = args.max_connections,
        pin_gateway = %args.pin_gateway_url,
        "starting dirgate"
    );

    let result = api::new(
        args.port,
        args.dsn,
        args.max_connections,
        args.pin_gateway_url,
        args.frontend_origin,
    )
    .await;

    telemetry::shutdown_tracer();

    result
}

/// Drops the password from a DSN for logging.
fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<redacted>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<redacted>".to_string(),
    }
}
