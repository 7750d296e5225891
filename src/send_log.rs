use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::HistoryArgs;
use crate::contacts::normalize_address;
use crate::model::{SendAttempt, SendStatus};

/// Append-only JSONL send log. File order is chronological; every attempt
/// the dispatcher makes lands here, resends included.
#[derive(Debug, Clone)]
pub struct SendLog {
    path: PathBuf,
}

impl SendLog {
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("send_log.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, attempt: &SendAttempt) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create data dir: {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open send log: {}", self.path.display()))?;
        let line = serde_json::to_string(attempt).context("serialize send attempt")?;
        writeln!(file, "{line}")
            .with_context(|| format!("append send attempt: {}", self.path.display()))?;
        Ok(())
    }

    pub fn all(&self) -> anyhow::Result<Vec<SendAttempt>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read send log: {}", self.path.display()));
            }
        };

        let mut attempts = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let attempt: SendAttempt = serde_json::from_str(line).with_context(|| {
                format!("parse send attempt at {}:{}", self.path.display(), idx + 1)
            })?;
            attempts.push(attempt);
        }
        Ok(attempts)
    }

    pub fn history(&self, recipient: &str) -> anyhow::Result<Vec<SendAttempt>> {
        let recipient = normalize_address(recipient);
        let attempts = self
            .all()?
            .into_iter()
            .filter(|attempt| attempt.recipient == recipient)
            .collect();
        Ok(attempts)
    }

    pub fn last_status(&self, recipient: &str) -> anyhow::Result<Option<SendStatus>> {
        Ok(self.history(recipient)?.last().map(|attempt| attempt.status))
    }

    /// Suppression predicate: any prior successful attempt counts, even when
    /// later attempts failed.
    pub fn has_sent(&self, recipient: &str) -> anyhow::Result<bool> {
        Ok(self
            .history(recipient)?
            .iter()
            .any(|attempt| attempt.status == SendStatus::Sent))
    }
}

pub fn history(args: HistoryArgs) -> anyhow::Result<()> {
    let log = SendLog::open(&args.data_dir);
    let attempts = match args.to.as_deref() {
        Some(recipient) => log.history(recipient)?,
        None => log.all()?,
    };

    let start = attempts.len().saturating_sub(args.limit);
    for attempt in &attempts[start..] {
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}",
            attempt.timestamp.to_rfc3339(),
            attempt.status,
            attempt.recipient,
            attempt.message_source,
            attempt.subject,
        );
        if let Some(detail) = attempt.error_detail.as_deref() {
            line.push('\t');
            line.push_str(detail);
        }
        println!("{line}");
    }
    tracing::info!(attempts = attempts.len(), "send history listed");
    Ok(())
}
