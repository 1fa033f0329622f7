use std::{io, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT_ENCODING, LAST_MODIFIED, USER_AGENT};
use reqwest::{Client, Response};

use super::util::{parse_http_date, sanitise_base_url, to_sync_reader};
use super::{BaseUrl, ManifestResponse, TransportError};

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("tilemirror/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote catalogue and tile provider.
#[async_trait(?Send)]
pub trait TileSource {
    /// Base URL of the tile service.
    fn base_url(&self) -> &BaseUrl;
    /// Request the manifest of `manifest_id`, returning once headers arrive.
    async fn fetch_manifest(&self, manifest_id: &str) -> Result<ManifestResponse, TransportError>;
    /// Download one tile body exactly as served.
    async fn fetch_tile(&self, source_id: &str, path: &str) -> Result<Vec<u8>, TransportError>;
}

/// HTTP implementation of [`TileSource`].
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: Client,
    base_url: BaseUrl,
    user_agent: String,
}

impl HttpTileSource {
    /// Construct an HTTP-backed tile source.
    ///
    /// # Errors
    /// Returns [`TransportError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| TransportError::Client { source })?;
        Ok(Self {
            client,
            base_url: sanitise_base_url(base_url),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    async fn call(&self, url: &str, accept_gzip: bool) -> Result<Response, TransportError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str());
        if accept_gzip {
            // Some payloads (vector tiles) are only compressed on request, and
            // consumers expect them stored compressed.
            request = request.header(ACCEPT_ENCODING, "gzip");
        }
        request
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))
    }
}

#[async_trait(?Send)]
impl TileSource for HttpTileSource {
    fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    async fn fetch_manifest(&self, manifest_id: &str) -> Result<ManifestResponse, TransportError> {
        let url = self.base_url.manifest_url(manifest_id);
        let response = self.call(&url, false).await?;
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);
        debug!("manifest {url} last modified {last_modified:?}");
        Ok(ManifestResponse {
            url,
            last_modified,
            body: to_sync_reader(response),
        })
    }

    async fn fetch_tile(&self, source_id: &str, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.base_url.tile_url(source_id, path);
        let response = self.call(&url, true).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, &url))?;
        Ok(body.to_vec())
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
