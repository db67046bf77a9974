use crate::core::constants::DEFAULT_SUBDOMAINS;
use crate::core::geo::TileKey;
use crate::{Result, TileError};

/// Trait representing anything that can produce tile URLs for a given key.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `key`.
    fn url(&self, key: TileKey) -> String;
}

/// URL template with `{z}`, `{x}`, `{y}` and optional `{s}` placeholders.
///
/// `{s}` is replaced by one of the subdomains, picked deterministically from
/// the tile indices so the same tile always hits the same host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        Self::with_subdomains(template, DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_subdomains(template: impl Into<String>, subdomains: Vec<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(TileError::InvalidInput(format!(
                    "tile URL template '{}' is missing {}",
                    template, placeholder
                )));
            }
        }
        if template.contains("{s}") && subdomains.is_empty() {
            return Err(TileError::InvalidInput(format!(
                "tile URL template '{}' uses {{s}} but no subdomains were given",
                template
            )));
        }
        Ok(Self {
            template,
            subdomains,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn subdomain(&self, key: TileKey) -> &str {
        let idx = ((key.x as u64 + key.y as u64) % self.subdomains.len() as u64) as usize;
        &self.subdomains[idx]
    }
}

impl TileSource for UrlTemplate {
    fn url(&self, key: TileKey) -> String {
        let mut url = self
            .template
            .replace("{z}", &key.z.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string());
        if url.contains("{s}") {
            url = url.replace("{s}", self.subdomain(key));
        }
        url
    }
}

/// Simple implementation that hits the default OpenStreetMap tile server.
pub struct OpenStreetMapSource {
    template: UrlTemplate,
}

impl OpenStreetMapSource {
    pub fn new() -> Self {
        Self {
            template: UrlTemplate {
                template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                subdomains: DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

impl Default for OpenStreetMapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for OpenStreetMapSource {
    fn url(&self, key: TileKey) -> String {
        self.template.url(key)
    }
}
