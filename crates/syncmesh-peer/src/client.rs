//! HTTP client for the signalling server API.

use std::time::Duration;

use log::{debug, info};
use reqwest::{Client, Response, StatusCode, Url};
use syncmesh_common::api::{
    ClientSnapshot, DiscoverResponse, ErrorResponse, PingResponse, RegisterRequest,
    RegisterResponse,
};
use syncmesh_common::HostPort;

use crate::error::{ClientError, ClientResult};

/// Timeout applied to every call to the signalling server.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Signalling server client.
#[derive(Clone)]
pub struct SignalClient {
    base_url: String,
    http: Client,
}

impl SignalClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:8089`).
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = base_url.trim_end_matches('/');
        match Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ClientError::InvalidUrl(base_url.to_string())),
        }

        // Register calls must reach the server directly: it records the source
        // address of the request as our public address.
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            base_url: base_url.to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register with the server, optionally advertising a local address.
    /// Returns the assigned client id.
    pub async fn register(&self, local: Option<&HostPort>) -> ClientResult<String> {
        info!("Registering with signalling server at {}", self.base_url);
        let response = self
            .http
            .post(self.url("/register"))
            .json(&RegisterRequest::new(local))
            .send()
            .await?;
        let response = check_status(response, "register").await?;

        let payload: RegisterResponse = response.json().await?;
        if payload.client_id.is_empty() {
            return Err(ClientError::BadResponse(
                "register response carried no clientId".to_string(),
            ));
        }
        Ok(payload.client_id)
    }

    /// Remove a registration. Succeeds whether or not the id was known.
    pub async fn unregister(&self, client_id: &str) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url("/unregister"))
            .query(&[("clientId", client_id)])
            .send()
            .await?;
        check_status(response, "unregister").await?;
        Ok(())
    }

    /// Refresh liveness of `client_id`.
    ///
    /// Returns [`ClientError::NotFound`] when the server no longer tracks the id.
    pub async fn heartbeat(&self, client_id: &str) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url("/heartbeat"))
            .query(&[("clientId", client_id)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(client_id.to_string()));
        }
        check_status(response, "heartbeat").await?;
        debug!("Heartbeat sent for {}", client_id);
        Ok(())
    }

    /// List live clients, leaving out `exclude_id` when given.
    pub async fn discover(&self, exclude_id: Option<&str>) -> ClientResult<Vec<ClientSnapshot>> {
        let mut request = self.http.get(self.url("/discover"));
        if let Some(id) = exclude_id {
            request = request.query(&[("excludeId", id)]);
        }
        let response = check_status(request.send().await?, "discover").await?;
        let payload: DiscoverResponse = response.json().await?;
        Ok(payload.clients)
    }

    pub async fn ping(&self) -> ClientResult<PingResponse> {
        let response = check_status(self.http.get(self.url("/ping")).send().await?, "ping").await?;
        Ok(response.json().await?)
    }
}

/// Pass 2xx responses through; turn anything else into [`ClientError::Status`].
async fn check_status(response: Response, endpoint: &'static str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(ClientError::Status {
        endpoint,
        status,
        message,
    })
}
