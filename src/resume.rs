use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

use crate::model::ResumeProfile;

/// Upper bound on the excerpt embedded into generation prompts.
pub const EXCERPT_MAX_CHARS: usize = 2500;

const SKILLS_WINDOW: usize = 10;
const PROJECTS_WINDOW: usize = 15;
const MAX_SKILLS: usize = 30;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("compile email regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{10}\b|\+\d{1,3}[-.\s]?\d{3}[-.\s]?\d{3}[-.\s]?\d{4}")
        .expect("compile phone regex")
});
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"linkedin\.com/in/[\w-]+").expect("compile link regex"));

/// Reads the resume file and returns its plain text. PDF files go through
/// pdf-extract; anything else is treated as UTF-8 text.
pub fn extract_text(path: &Path) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read resume: {}", path.display()))?;
    text_from_bytes(path, &bytes)
}

pub fn text_from_bytes(path: &Path, bytes: &[u8]) -> anyhow::Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| anyhow::anyhow!("extract pdf text: {}: {err}", path.display()))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Best-effort structure scan over resume text. Anything it cannot find is
/// simply absent; this never fails.
pub fn extract_profile(text: &str) -> ResumeProfile {
    let text = text.trim();
    if text.is_empty() {
        return ResumeProfile::default();
    }

    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    ResumeProfile {
        name: name_hint(&lines),
        email: EMAIL_RE.find(text).map(|m| m.as_str().to_owned()),
        phone: PHONE_RE.find(text).map(|m| m.as_str().to_owned()),
        link: LINK_RE.find(text).map(|m| m.as_str().to_owned()),
        skills: skills_from(&lines),
        projects: projects_from(&lines),
        excerpt: truncate_chars(text, EXCERPT_MAX_CHARS).to_owned(),
        text_len: text.chars().count(),
    }
}

/// Extraction keyed by resume content hash so repeat runs skip PDF parsing.
/// A missing or stale cache entry is recomputed; cache write failures only
/// cost the next run the same work.
pub fn cached_profile(data_dir: &Path, resume_path: &Path) -> anyhow::Result<ResumeProfile> {
    let bytes = std::fs::read(resume_path)
        .with_context(|| format!("read resume: {}", resume_path.display()))?;
    let cache_path = data_dir
        .join("cache")
        .join(format!("resume-{}.json", content_key(&bytes)));

    if let Ok(raw) = std::fs::read(&cache_path)
        && let Ok(profile) = serde_json::from_slice::<ResumeProfile>(&raw)
    {
        tracing::debug!(cache = %cache_path.display(), "resume profile cache hit");
        return Ok(profile);
    }

    let text = text_from_bytes(resume_path, &bytes)?;
    let profile = extract_profile(&text);
    if let Err(err) = write_json_atomic(&cache_path, &profile) {
        tracing::debug!(error = format!("{err:#}"), "skip resume profile cache write");
    }
    tracing::info!(
        resume = %resume_path.display(),
        skills = profile.skills.len(),
        projects = profile.projects.len(),
        chars = profile.text_len,
        "resume profile extracted"
    );
    Ok(profile)
}

fn content_key(bytes: &[u8]) -> String {
    use sha2::Digest as _;

    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn name_hint(lines: &[&str]) -> Option<String> {
    for line in lines.iter().take(10) {
        if line.is_empty() {
            continue;
        }
        let words = line.split_whitespace().count();
        let lowered = line.to_lowercase();
        if (2..=4).contains(&words)
            && line.chars().count() < 30
            && !line.contains('@')
            && !line.chars().any(|c| c.is_ascii_digit())
            && !lowered.contains("resume")
            && !lowered.contains("curriculum")
        {
            return Some((*line).to_owned());
        }
    }
    None
}

fn skills_from(lines: &[&str]) -> Vec<String> {
    let mut skills = Vec::new();
    let mut seen = Vec::new();
    for line in section_lines(lines, "skill", SKILLS_WINDOW) {
        for term in line.split(['•', ',', ';', '|', '·']) {
            let term = term.trim().trim_start_matches(['-', '*']).trim();
            if term.len() < 2 || term.len() > 40 {
                continue;
            }
            let lowered = term.to_lowercase();
            if seen.contains(&lowered) {
                continue;
            }
            seen.push(lowered);
            skills.push(term.to_owned());
            if skills.len() == MAX_SKILLS {
                return skills;
            }
        }
    }
    skills
}

fn projects_from(lines: &[&str]) -> Vec<String> {
    section_lines(lines, "project", PROJECTS_WINDOW)
        .iter()
        .filter_map(|line| {
            let title = line.trim_start_matches(['-', '*', '•']).trim();
            ((3..=80).contains(&title.chars().count())).then(|| title.to_owned())
        })
        .collect()
}

/// Lines following the first line that mentions `needle` (the heading line
/// itself excluded), up to `window` lines or the next blank line.
fn section_lines<'a>(lines: &[&'a str], needle: &str, window: usize) -> Vec<&'a str> {
    let Some(start) = lines
        .iter()
        .position(|line| line.to_lowercase().contains(needle))
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in &lines[start + 1..] {
        if line.is_empty() {
            if out.is_empty() {
                continue;
            }
            break;
        }
        out.push(*line);
        if out.len() == window {
            break;
        }
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
