use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One validated contact in the contact book. Records are append-only;
/// removal happens only through `contact prune`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientRecord {
    pub address: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageSource {
    AiGenerated,
    FallbackTemplate,
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AiGenerated => f.write_str("ai-generated"),
            Self::FallbackTemplate => f.write_str("fallback-template"),
        }
    }
}

/// One line of the send log. Exactly one attempt is recorded per recipient
/// the dispatcher actually hands to the transport; skipped recipients leave
/// no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAttempt {
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub message_source: MessageSource,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMessage {
    pub subject: String,
    pub body: String,
    pub source: MessageSource,
}

/// Applicant identity used for generation and composition. Loaded once per
/// run from `profile.yaml`, with gaps filled from the resume profile.
#[derive(Debug, Clone)]
pub struct SenderProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub link: String,
    pub job_role: String,
    pub resume_path: PathBuf,
}

/// Structured highlights pulled out of the resume text. Extraction is
/// best-effort; the empty default never blocks sending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub skills: Vec<String>,
    pub projects: Vec<String>,
    pub excerpt: String,
    pub text_len: usize,
}
