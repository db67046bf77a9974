use async_trait::async_trait;

use crate::Result;

/// Network collaborator that downloads a tile payload.
///
/// Non-2xx responses and transport errors must be returned as errors; the
/// preloader counts them per tile and never retries on its own.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::TileError;
    use once_cell::sync::Lazy;

    /// Shared async HTTP client with a custom User-Agent so that public tile
    /// servers (e.g. OpenStreetMap) don't reject the request. Building the client
    /// once avoids the cost of TLS and connection pool setup for every tile.
    pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent(concat!("maplet-tiles/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            })
    });

    /// Tile fetcher backed by `reqwest`
    #[derive(Debug, Clone)]
    pub struct HttpTileFetcher {
        client: reqwest::Client,
    }

    impl HttpTileFetcher {
        pub fn new() -> Self {
            Self {
                client: HTTP_CLIENT.clone(),
            }
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl Default for HttpTileFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TileFetcher for HttpTileFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| TileError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TileError::HttpStatus {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }

            let data = response
                .bytes()
                .await
                .map_err(|e| TileError::Network(e.to_string()))?;
            log::debug!("downloaded {} ({} bytes)", url, data.len());
            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpTileFetcher;
