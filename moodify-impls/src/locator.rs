use std::path::{Path, PathBuf};

use log::debug;
use reqwest::Client;
use url::{ParseError, Url};

use crate::{probe_duration, ProbeError};

/// Where the bytes of a source can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

/// Finds and fetches sources.
///
/// Sources can be absolute URLs, `file://` URLs, or paths. Paths are resolved against the base URL
/// if there is one, since the analyzer hands out paths relative to itself. Without a base they are local paths.
#[derive(Debug, Clone, Default)]
pub struct SourceLocator {
    base: Option<Url>,
    client: Client,
}

impl SourceLocator {
    pub fn new(base: Option<Url>) -> Self {
        Self {
            base,
            client: Client::new(),
        }
    }

    pub fn resolve(&self, source: &str) -> Result<Location, ProbeError> {
        let invalid = || ProbeError::InvalidLocation(source.to_string());

        let url = match Url::parse(source) {
            Ok(url) => url,
            Err(ParseError::RelativeUrlWithoutBase) => match &self.base {
                Some(base) => base.join(source).map_err(|_| invalid())?,
                None => return Ok(Location::Local(PathBuf::from(source))),
            },
            Err(_) => return Err(invalid()),
        };

        match url.scheme() {
            "http" | "https" => Ok(Location::Remote(url)),
            "file" => url.to_file_path().map(Location::Local).map_err(|_| invalid()),
            // Drive letters look like schemes.
            _ => Ok(Location::Local(PathBuf::from(source))),
        }
    }

    /// Reads the whole source into memory.
    pub async fn fetch(&self, source: &str) -> Result<Vec<u8>, ProbeError> {
        match self.resolve(source)? {
            Location::Remote(url) => {
                debug!("Fetching {}", url);

                let response = self.client.get(url).send().await?;
                let status = response.status();

                if !status.is_success() {
                    return Err(ProbeError::Status(status));
                }

                Ok(response.bytes().await?.to_vec())
            }
            Location::Local(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    /// Fetches a source and reads its length in seconds.
    pub async fn probe(&self, source: &str) -> Result<f32, ProbeError> {
        let bytes = self.fetch(source).await?;
        let extension = extension_of(source);

        tokio::task::spawn_blocking(move || probe_duration(bytes, extension.as_deref())).await?
    }
}

fn extension_of(source: &str) -> Option<String> {
    let path = source.split(['?', '#']).next().unwrap_or(source);

    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
