use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scheduled {
    pub status: String,
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyResult {
    pub status: String,
    pub id: u64,
    pub tone: String,
    pub reply: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyFailure {
    pub status: String,
    pub id: u64,
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tones {
    pub tones: Vec<String>,
}
