//! `reqwest` client for the PIN gateway HTTP contract.

use async_trait::async_trait;
use reqwest::{header::COOKIE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::{PinGateway, PinGatewayError, PinVerdict};
use crate::APP_USER_AGENT;

const PIN_PATH: &str = "/api/pin";

#[derive(Serialize)]
struct PinRequest<'a> {
    pin: &'a str,
}

#[derive(Deserialize)]
struct PinErrorBody {
    error: Option<String>,
}

/// Talks to the gateway with a cookie store so the marker cookie set by a
/// successful `POST` is replayed on later probes.
#[derive(Clone, Debug)]
pub struct HttpPinGateway {
    client: Client,
    endpoint: Url,
}

impl HttpPinGateway {
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL or the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, PinGatewayError> {
        Self::build(base_url, true)
    }

    /// Client for a server checking markers on behalf of its callers: no
    /// cookie jar, each [`probe_as`](Self::probe_as) carries the caller's cookies.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL or the client cannot be built.
    pub fn forwarding(base_url: &str) -> Result<Self, PinGatewayError> {
        Self::build(base_url, false)
    }

    fn build(base_url: &str, cookie_store: bool) -> Result<Self, PinGatewayError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(PIN_PATH))
            .map_err(|err| PinGatewayError::Config(format!("invalid base URL {base_url}: {err}")))?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_store(cookie_store)
            .build()
            .map_err(|err| PinGatewayError::Config(err.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Probes with a caller's `Cookie` header.
    ///
    /// # Errors
    /// Returns an error if the gateway cannot be reached.
    #[instrument(skip(self, cookies), fields(endpoint = %self.endpoint))]
    pub async fn probe_as(&self, cookies: &str) -> Result<bool, PinGatewayError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(COOKIE, cookies)
            .send()
            .await
            .map_err(|err| network(&err))?;

        debug!(status = %response.status(), "forwarded PIN probe");
        Ok(response.status() == StatusCode::OK)
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn network(err: &reqwest::Error) -> PinGatewayError {
    PinGatewayError::Network(err.to_string())
}

#[async_trait]
impl PinGateway for HttpPinGateway {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn probe(&self) -> Result<bool, PinGatewayError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|err| network(&err))?;

        debug!(status = %response.status(), "PIN probe");
        Ok(response.status() == StatusCode::OK)
    }

    #[instrument(skip(self, pin), fields(endpoint = %self.endpoint))]
    async fn submit(&self, pin: &str) -> Result<PinVerdict, PinGatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&PinRequest { pin })
            .send()
            .await
            .map_err(|err| network(&err))?;

        match response.status() {
            StatusCode::OK => Ok(PinVerdict::Verified),
            StatusCode::UNAUTHORIZED => {
                // A missing or malformed body still counts as a rejection.
                let message = response
                    .json::<PinErrorBody>()
                    .await
                    .ok()
                    .and_then(|body| body.error)
                    .filter(|message| !message.trim().is_empty());
                Ok(PinVerdict::Rejected { message })
            }
            status => Err(PinGatewayError::Status(status.as_u16())),
        }
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn clear(&self) -> Result<(), PinGatewayError> {
        let response = self
            .client
            .delete(self.endpoint.clone())
            .send()
            .await
            .map_err(|err| network(&err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PinGatewayError::Status(response.status().as_u16()))
        }
    }
}
