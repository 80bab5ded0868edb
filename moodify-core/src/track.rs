use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};

/// A track recommended by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Identifies the track. Empty if the analyzer did not provide one.
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Where the audio of the track can be loaded from.
    #[serde(default)]
    pub file: String,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            file: file.into(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    /// Returns true if the track can be identified
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.artist.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} by {}", self.title, self.artist)
        }
    }
}

/// Ids can be sent as strings or numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    let raw: Option<RawId> = Option::deserialize(deserializer)?;

    Ok(match raw {
        Some(RawId::Text(text)) => text,
        Some(RawId::Integer(number)) => number.to_string(),
        Some(RawId::Float(number)) => number.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod test {
    use super::Track;

    #[test]
    fn test_id_formats() {
        let text: Track = serde_json::from_str(r#"{"id": "abc", "title": "A"}"#).unwrap();
        let number: Track = serde_json::from_str(r#"{"id": 1, "title": "B"}"#).unwrap();
        let null: Track = serde_json::from_str(r#"{"id": null, "title": "C"}"#).unwrap();
        let missing: Track = serde_json::from_str(r#"{"title": "D"}"#).unwrap();

        assert_eq!(text.id, "abc");
        assert_eq!(number.id, "1", "numeric ids become strings");
        assert!(!null.has_id(), "null id is no id");
        assert!(!missing.has_id(), "missing id is no id");
    }

    #[test]
    fn test_display() {
        let track = Track::new("1", "Sunny", "/static/samples/sunny.mp3");
        assert_eq!(track.to_string(), "Sunny");

        let track = track.with_artist("Local Band");
        assert_eq!(track.to_string(), "Sunny by Local Band");
    }
}
