// REST client for the fleet server
//
// Wraps `reqwest::Client` with URL construction and response decoding for
// the handful of collections the sync engine needs: the device list, the
// latest-position list, single events and the server preferences.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::{Device, Event, Position, Server};
use crate::transport::TransportConfig;

/// Raw HTTP client for the fleet server's REST API.
///
/// All methods return decoded payloads; status handling and body preview
/// on decode failure happen in one place.
#[derive(Clone)]
pub struct FleetClient {
    http: reqwest::Client,
    base_url: Url,
    /// Cookie jar reference for extracting session cookies (socket auth).
    cookie_jar: Option<Arc<Jar>>,
    authorization: Option<String>,
}

impl FleetClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root, e.g. `https://fleet.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            cookie_jar: config.cookie_jar.clone(),
            authorization: config.authorization_header(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            cookie_jar: None,
            authorization: None,
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Push socket URL: `ws(s)://host[:port]/api/socket`.
    pub fn socket_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("socket")?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive socket URL from {}", self.base_url)))?;
        Ok(url)
    }

    /// Headers the socket upgrade request needs to share this session.
    pub fn socket_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(cookie) = self.cookie_header() {
            headers.push(("Cookie".to_owned(), cookie));
        }
        if let Some(ref auth) = self.authorization {
            headers.push(("Authorization".to_owned(), auth.clone()));
        }
        headers
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/devices` -- every device visible to the session.
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        self.get(self.api_url("devices")?).await
    }

    /// `GET /api/positions` -- the latest position of each device.
    pub async fn list_positions(&self) -> Result<Vec<Position>, Error> {
        self.get(self.api_url("positions")?).await
    }

    /// `GET /api/events/{id}` -- a single event, used when a wake-up
    /// notification only carries the event id.
    pub async fn get_event(&self, id: i64) -> Result<Event, Error> {
        self.get(self.api_url(&format!("events/{id}"))?).await
    }

    /// `GET /api/server` -- server-wide preferences.
    pub async fn get_server(&self) -> Result<Server, Error> {
        self.get(self.api_url("server")?).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

/// First 200 bytes of a body, cut on a char boundary.
fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
