use std::{env, path::PathBuf};

use moodify_client::{Mode, UnknownMode};
use moodify_core::Config;
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/analyze";

/// Everything the binary can be configured with.
#[derive(Debug)]
pub struct Settings {
    /// Where the analyzer accepts requests. Relative track files are resolved against it.
    pub endpoint: Url,
    pub mode: Mode,
    /// An image file that is re-read on every detection, standing in for a camera
    pub frame_path: Option<PathBuf>,
    pub config: Config,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("MOODIFY_ENDPOINT is not a valid URL: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("MOODIFY_MODE is invalid: {0}")]
    Mode(#[from] UnknownMode),
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, SettingsError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("MOODIFY_ENDPOINT")
            .map(|x| Url::parse(&x))
            .unwrap_or_else(|| Url::parse(DEFAULT_ENDPOINT))?;

        let mode = lookup("MOODIFY_MODE")
            .map(|x| x.parse::<Mode>())
            .transpose()?
            .unwrap_or_default();

        let frame_path = lookup("MOODIFY_FRAME_PATH")
            .filter(|x| !x.trim().is_empty())
            .map(PathBuf::from);

        let mut config = Config::default();

        if let Some(fallback) = lookup("MOODIFY_FALLBACK_SOURCE") {
            config.fallback_source = fallback;
        }

        Ok(Self {
            endpoint,
            mode,
            frame_path,
            config,
        })
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<_, _> = vars.iter().copied().collect();
        Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(settings.mode, Mode::Match);
        assert_eq!(settings.frame_path, None);
        assert_eq!(settings.config.fallback_source, "/static/samples/neutral1.mp3");
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("MOODIFY_ENDPOINT", "https://moods.example.com/analyze"),
            ("MOODIFY_MODE", "lift"),
            ("MOODIFY_FRAME_PATH", "/tmp/frame.jpg"),
            ("MOODIFY_FALLBACK_SOURCE", "/music/quiet.mp3"),
        ])
        .unwrap();

        assert_eq!(settings.endpoint.host_str(), Some("moods.example.com"));
        assert_eq!(settings.mode, Mode::Lift);
        assert_eq!(settings.frame_path, Some(PathBuf::from("/tmp/frame.jpg")));
        assert_eq!(settings.config.fallback_source, "/music/quiet.mp3");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("MOODIFY_ENDPOINT", "not a url")]),
            Err(SettingsError::Endpoint(_))
        ));
        assert!(matches!(
            settings(&[("MOODIFY_MODE", "sideways")]),
            Err(SettingsError::Mode(_))
        ));
    }
}
