//! One-shot audio upload to a speech-to-text endpoint.
//!
//! Reads a local audio file and POSTs its bytes as the request body,
//! then writes each response line to the given output. Deliberately
//! minimal: one blocking request, no retry, no streaming upload.
//!
//! The endpoint and credentials are configuration, never source
//! literals; the token reaches the CLI through an environment variable.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use url::Url;

/// Default endpoint, overridable per call.
pub const DEFAULT_ENDPOINT: &str =
    "https://stream.watsonplatform.net/speech-to-text/api/v1/recognize?continuous=true";

/// Default request content type.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/flac";

/// Connection settings for the speech-to-text call.
#[derive(Clone, Debug)]
pub struct SttConfig {
    /// Endpoint URL.
    pub url: String,
    /// Base64 credential for the `Authorization: Basic` header. `None`
    /// sends the request unauthenticated.
    pub auth_token: Option<String>,
    /// Content type of the uploaded audio.
    pub content_type: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            auth_token: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Upload one audio file and stream the response lines to `out`.
///
/// Returns the number of lines written. The server's response body is
/// printed even when it answers with an error status, since transcription
/// services put diagnostics there; transport failures are terminal.
pub fn upload(config: &SttConfig, audio_path: &Path, out: &mut dyn Write) -> Result<u64> {
    Url::parse(&config.url).with_context(|| format!("parse endpoint url '{}'", config.url))?;

    let audio = std::fs::read(audio_path)
        .with_context(|| format!("read audio file {}", audio_path.display()))?;
    if audio.is_empty() {
        return Err(anyhow!("audio file {} is empty", audio_path.display()));
    }

    let mut request = ureq::post(&config.url).set("Content-Type", &config.content_type);
    if let Some(token) = &config.auth_token {
        request = request.set("Authorization", &format!("Basic {token}"));
    }

    let response = match request.send_bytes(&audio) {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            log::warn!("speech-to-text endpoint answered with status {code}");
            response
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context("post audio to speech-to-text endpoint"))
        }
    };

    let reader = BufReader::new(response.into_reader());
    let mut lines = 0u64;
    for line in reader.lines() {
        let line = line.context("read response line")?;
        writeln!(out, "{line}").context("write response line")?;
        lines += 1;
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_malformed_url() {
        let config = SttConfig {
            url: "not a url".to_string(),
            ..SttConfig::default()
        };
        let mut out = Vec::new();
        assert!(upload(&config, Path::new("/nonexistent.flac"), &mut out).is_err());
    }

    #[test]
    fn rejects_a_missing_audio_file() {
        let config = SttConfig::default();
        let mut out = Vec::new();
        let err = upload(&config, Path::new("/no/such/file.flac"), &mut out).unwrap_err();
        assert!(err.to_string().contains("read audio file"));
    }
}
