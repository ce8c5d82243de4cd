//! Export of a successful verification result

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// Proof payload rendered as a downloadable JSON file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofArtifact {
    file_name: String,
    contents: String,
}

impl ProofArtifact {
    /// Renders `payload` as `<provider_name>_<timestamp>.json`
    #[must_use]
    pub fn new(provider_name: &str, payload: &serde_json::Value, exported_at: DateTime<Utc>) -> Self {
        let timestamp = exported_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");

        Self {
            file_name: format!("{provider_name}_{timestamp}.json"),
            contents: serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
        }
    }

    /// File name the artifact is offered under
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Pretty-printed JSON payload
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Writes the artifact into `dir` and returns the written path
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or the file cannot be written
    pub async fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.contents).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exported_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-04T05:06:07.089Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_file_name_uses_provider_and_timestamp() {
        let artifact = ProofArtifact::new("Amazon", &json!({}), exported_at());
        assert_eq!(artifact.file_name(), "Amazon_2025-03-04T05-06-07-089Z.json");
    }

    #[test]
    fn test_contents_are_pretty_json() {
        let payload = json!({"claim": "age>18"});
        let artifact = ProofArtifact::new("Uber", &payload, exported_at());

        assert_eq!(artifact.contents(), "{\n  \"claim\": \"age>18\"\n}");
        let parsed: serde_json::Value = serde_json::from_str(artifact.contents()).unwrap();
        assert_eq!(parsed, payload);
    }

    #[tokio::test]
    async fn test_write_to_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ProofArtifact::new("Netflix", &json!([1, 2]), exported_at());

        let path = artifact.write_to(&dir.path().join("exports")).await.unwrap();

        assert_eq!(path.file_name().unwrap(), artifact.file_name());
        assert_eq!(std::fs::read_to_string(path).unwrap(), artifact.contents());
    }
}
