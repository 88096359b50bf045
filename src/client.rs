//! Blocking client for the Gemini `generateContent` endpoint.

use crate::{
    config::{Credential, GeminiConfig},
    error::ReplyError,
    payload::{InlineImage, build_prompt},
};
use serde::{Deserialize, Serialize};

/// Request body of `generateContent`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    /// A single user turn.
    pub contents: Vec<Content>,
}

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    /// Ordered parts: the prompt text, then the image.
    pub parts: Vec<Part>,
}

/// A request part, serialized without a tag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain instruction text.
    Text { text: String },
    /// Base64 binary data with its MIME type.
    InlineData { inline_data: InlineData },
}

/// Inline binary content of a request part.
#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    /// Declared MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Standard base64 of the raw bytes.
    pub data: String,
}

/// The subset of the response body this client reads.
///
/// Every level is optional: a missing or `null` field means the model
/// produced nothing usable.
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    /// Alternative generations; only the first is read.
    pub candidates: Option<Vec<Candidate>>,
}

/// One generated alternative.
#[derive(Debug, Deserialize)]
pub struct Candidate {
    /// Absent when the candidate was blocked.
    pub content: Option<CandidateContent>,
}

/// Content of a candidate.
#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    /// Generated parts; only the first is read.
    pub parts: Option<Vec<CandidatePart>>,
}

/// A generated part. Non-text parts have no `text`.
#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentRequest {
    /// One text part followed by one inline image part.
    pub fn new(prompt: String, image: &InlineImage) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type.as_str().to_string(),
                            data: image.data.clone(),
                        },
                    },
                ],
            }],
        }
    }
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, trimmed. Blank text
    /// counts as no text.
    pub fn reply_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Sends reply requests to one Gemini `generateContent` endpoint.
///
/// Holds the credential it was built with; nothing is read from the
/// environment after construction.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    credential: Credential,
}

impl GeminiClient {
    /// Creates a client for the endpoint and credential in `config`.
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: config.endpoint(),
            credential: config.credential.clone(),
        }
    }

    /// The full `generateContent` URL, without the key.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one request and classifies the outcome. Never retries.
    pub fn generate_reply(&self, image: &InlineImage, tone: &str) -> Result<String, ReplyError> {
        let payload = GenerateContentRequest::new(build_prompt(tone), image);

        log::debug!(
            "Posting generateContent request ({} base64 bytes, {})",
            image.data.len(),
            image.mime_type.as_str()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.credential.expose())])
            .json(&payload)
            .send()
            // the url embeds the key
            .map_err(|e| ReplyError::transport(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ReplyError::transport(e.without_url()))?;

        if status != reqwest::StatusCode::OK {
            log::warn!("Gemini returned status {}", status.as_u16());
            return Err(ReplyError::RemoteApi {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(ReplyError::transport)?;

        match parsed.reply_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                log::warn!("Gemini returned no usable candidate");
                Err(ReplyError::EmptyGeneration)
            }
        }
    }
}
