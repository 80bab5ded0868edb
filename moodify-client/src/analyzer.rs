use std::{fmt::Display, future::Future, str::FromStr, time::Duration};

use async_trait::async_trait;
use log::warn;
use moodify_core::{Config, Track};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Failed to reach the analyzer: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Analyzer responded with status {0}")]
    Status(StatusCode),
}

/// How detected moods are mapped to music.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Play music matching the mood.
    #[default]
    Match,
    /// Play music that lifts the mood.
    Lift,
}

#[derive(Debug, Error)]
#[error("Unknown mode \"{0}\", expected \"match\" or \"lift\"")]
pub struct UnknownMode(String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "match" => Ok(Self::Match),
            "lift" => Ok(Self::Lift),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Lift => write!(f, "lift"),
        }
    }
}

/// The body posted to the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    /// A captured frame, as a data URL
    pub image: Option<String>,
    pub mode: Mode,
    /// A mood to use instead of analyzing a frame
    pub manual: Option<String>,
}

impl AnalyzeRequest {
    /// A request to detect the mood in a frame.
    pub fn detect(image: String, mode: Mode) -> Self {
        Self {
            image: Some(image),
            mode,
            manual: None,
        }
    }

    /// A request for tracks matching a known mood.
    pub fn manual(mood: &str, mode: Mode) -> Self {
        Self {
            image: None,
            mode,
            manual: Some(mood.to_string()),
        }
    }
}

/// What the analyzer responds with.
///
/// Every field is optional on the wire. Track entries that can not be read are left out.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tracks")]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalyzeResponse {
    /// Returns the detected emotion, if the analyzer provided a non-empty one.
    pub fn emotion(&self) -> Option<&str> {
        self.emotion
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

fn deserialize_tracks<'de, D>(deserializer: D) -> Result<Vec<Track>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// Represents a type that can infer a mood and recommend tracks.
#[async_trait]
pub trait Analyzer
where
    Self: Send + Sync + 'static,
{
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AnalyzerError>;
}

/// An analyzer reached over HTTP.
pub struct HttpAnalyzer {
    client: Client,
    endpoint: Url,
    retries: usize,
    backoff: Duration,
}

impl HttpAnalyzer {
    pub fn new(endpoint: Url, config: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            retries: config.analyze_retries,
            backoff: config.analyze_backoff,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AnalyzerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            return Err(AnalyzerError::Status(status));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, AnalyzerError> {
        with_retry(self.retries, self.backoff, || self.send(request)).await
    }
}

/// Runs an operation, retrying it up to `retries` times with a fixed backoff in between.
/// The error of the last attempt is returned if every attempt fails.
pub async fn with_retry<T, E, F, Fut>(retries: usize, backoff: Duration, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!("Attempt {} failed, retrying: {}", attempt, e);

                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::{net::TcpListener, time::Instant};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retry_once() {
        let attempts = AtomicUsize::new(0);
        let start = Instant::now();

        let result: Result<&str, String> = with_retry(1, Duration::from_millis(400), || async {
            match attempts.fetch_add(1, Ordering::SeqCst) {
                0 => Err("offline".to_string()),
                _ => Ok("online"),
            }
        })
        .await;

        assert_eq!(result, Ok("online"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(400), "waited for the backoff");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), String> = with_retry(1, Duration::from_millis(400), || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {attempt}"))
        })
        .await;

        assert_eq!(result, Err("failure 1".to_string()), "last error is returned");
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "exactly one retry");
    }

    #[derive(Default)]
    struct ServerState {
        hits: AtomicUsize,
        bodies: Mutex<Vec<Value>>,
        failures: usize,
    }

    async fn analyze(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> impl IntoResponse {
        let hit = state.hits.fetch_add(1, Ordering::SeqCst);
        state.bodies.lock().unwrap().push(body);

        if hit < state.failures {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" }))).into_response();
        }

        Json(json!({
            "emotion": "happy",
            "tracks": [
                { "id": 1, "title": "Sunny", "artist": "Local", "file": "/static/samples/sunny.mp3" },
                null,
                "garbage",
                { "id": "2", "title": "Bright", "artist": "Local", "file": "/static/samples/bright.mp3" }
            ]
        }))
        .into_response()
    }

    async fn serve(failures: usize) -> (Url, Arc<ServerState>) {
        let state = Arc::new(ServerState {
            failures,
            ..Default::default()
        });

        let app = Router::new()
            .route("/analyze", post(analyze))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let url = Url::parse(&format!("http://{address}/analyze")).unwrap();
        (url, state)
    }

    fn fast_config() -> Config {
        Config {
            analyze_backoff: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_http_analyze() {
        let (url, state) = serve(0).await;
        let analyzer = HttpAnalyzer::new(url, &fast_config());

        let response = analyzer
            .analyze(&AnalyzeRequest::detect("data:image/jpeg;base64,AA==".to_string(), Mode::Lift))
            .await
            .unwrap();

        assert_eq!(response.emotion(), Some("happy"));
        assert_eq!(
            response.tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2"],
            "unreadable entries are left out"
        );

        let bodies = state.bodies.lock().unwrap();
        assert_eq!(
            bodies[0],
            json!({ "image": "data:image/jpeg;base64,AA==", "mode": "lift", "manual": null })
        );
    }

    #[tokio::test]
    async fn test_http_retries_failed_status() {
        let (url, state) = serve(1).await;
        let analyzer = HttpAnalyzer::new(url, &fast_config());

        let response = analyzer
            .analyze(&AnalyzeRequest::manual("happy", Mode::Match))
            .await
            .unwrap();

        assert_eq!(response.tracks.len(), 2);
        assert_eq!(state.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_http_fails_after_retry() {
        let (url, state) = serve(2).await;
        let analyzer = HttpAnalyzer::new(url, &fast_config());

        let result = analyzer
            .analyze(&AnalyzeRequest::manual("sad", Mode::Match))
            .await;

        assert!(matches!(result, Err(AnalyzerError::Status(s)) if s.as_u16() == 500));
        assert_eq!(state.hits.load(Ordering::SeqCst), 2, "no more than one retry");
    }

    #[test]
    fn test_response_without_fields() {
        let response: AnalyzeResponse = serde_json::from_str(r#"{"tracks": null}"#).unwrap();

        assert_eq!(response.emotion(), None);
        assert!(response.tracks.is_empty());

        let response: AnalyzeResponse = serde_json::from_str(r#"{"emotion": "  "}"#).unwrap();
        assert_eq!(response.emotion(), None, "blank emotion is no emotion");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Lift".parse::<Mode>().unwrap(), Mode::Lift);
        assert_eq!(" match ".parse::<Mode>().unwrap(), Mode::Match);
        assert!("sideways".parse::<Mode>().is_err());
    }
}
