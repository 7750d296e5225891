use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use chrono::Utc;
use regex::Regex;

use crate::cli::{ContactAddArgs, ContactListArgs, ContactPruneArgs};
use crate::model::RecipientRecord;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("compile address regex")
});

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// Addresses are compared and stored lower-cased so the book stays
/// case-insensitively unique.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    Duplicate,
}

/// Append-only JSONL contact book. Listing preserves insertion order.
#[derive(Debug, Clone)]
pub struct ContactBook {
    path: PathBuf,
}

impl ContactBook {
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("contacts.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&self, address: &str) -> anyhow::Result<AddOutcome> {
        let normalized = normalize_address(address);
        if !is_valid_address(&normalized) {
            anyhow::bail!("invalid email address: {address}");
        }

        let existing = self.list().context("read contact book")?;
        if existing.iter().any(|record| record.address == normalized) {
            return Ok(AddOutcome::Duplicate);
        }

        let record = RecipientRecord {
            address: normalized,
            added_at: Utc::now(),
        };
        self.append(&record)?;
        Ok(AddOutcome::Inserted)
    }

    pub fn list(&self) -> anyhow::Result<Vec<RecipientRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read contact book: {}", self.path.display()));
            }
        };

        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: RecipientRecord = serde_json::from_str(line).with_context(|| {
                format!("parse contact record at {}:{}", self.path.display(), idx + 1)
            })?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        Ok(self.list()?.len())
    }

    /// Drops records whose address no longer passes validation and rewrites
    /// the book atomically. Returns (kept, removed).
    pub fn prune(&self) -> anyhow::Result<(usize, usize)> {
        let records = self.list().context("read contact book")?;
        let (kept, removed): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|record| is_valid_address(&record.address));
        if removed.is_empty() {
            return Ok((kept.len(), 0));
        }

        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        {
            let file = OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp_path)
                .with_context(|| format!("create contact book tmp: {}", tmp_path.display()))?;
            let mut out = BufWriter::new(file);
            for record in &kept {
                serde_json::to_writer(&mut out, record).context("serialize contact record")?;
                out.write_all(b"\n").context("write contact newline")?;
            }
            out.flush().context("flush contact book tmp")?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("rename tmp to final: {}", self.path.display()))?;

        for record in &removed {
            tracing::info!(address = %record.address, "pruned invalid contact");
        }
        Ok((kept.len(), removed.len()))
    }

    fn append(&self, record: &RecipientRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create data dir: {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open contact book: {}", self.path.display()))?;
        let line = serde_json::to_string(record).context("serialize contact record")?;
        writeln!(file, "{line}")
            .with_context(|| format!("append contact record: {}", self.path.display()))?;
        Ok(())
    }
}

pub fn add(args: ContactAddArgs) -> anyhow::Result<()> {
    let book = ContactBook::open(&args.data_dir);
    let normalized = normalize_address(&args.address);
    match book.add(&args.address)? {
        AddOutcome::Inserted => {
            tracing::info!(address = %normalized, "contact added");
            println!("added\t{normalized}");
        }
        AddOutcome::Duplicate => {
            tracing::info!(address = %normalized, "contact already present");
            println!("duplicate\t{normalized}");
        }
    }
    Ok(())
}

pub fn list(args: ContactListArgs) -> anyhow::Result<()> {
    let book = ContactBook::open(&args.data_dir);
    let records = book.list()?;
    tracing::info!(contacts = records.len(), "contact book listed");
    for record in records {
        println!("{}", record.address);
    }
    Ok(())
}

pub fn prune(args: ContactPruneArgs) -> anyhow::Result<()> {
    let book = ContactBook::open(&args.data_dir);
    let (kept, removed) = book.prune()?;
    println!("kept {kept}, removed {removed}");
    Ok(())
}
