use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

use crate::cli::{ProfileShowArgs, TransportKind};
use crate::model::{ResumeProfile, SenderProfile};

pub const DEFAULT_JOB_ROLE: &str = "Software Engineer";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Process-level settings. CLI flags override these; these override the
/// built-in defaults. A `.env` file in the working directory is honored.
#[derive(Debug, Clone)]
pub struct Settings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub transport: Option<TransportKind>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let smtp_port = match std::env::var("JOBREACH_SMTP_PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("parse JOBREACH_SMTP_PORT: {raw:?}"))?,
            Err(_) => DEFAULT_SMTP_PORT,
        };
        let transport = match std::env::var("JOBREACH_TRANSPORT") {
            Ok(raw) => Some(
                TransportKind::parse(&raw)
                    .with_context(|| format!("parse JOBREACH_TRANSPORT: {raw:?}"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            smtp_host: env_or("JOBREACH_SMTP_HOST", DEFAULT_SMTP_HOST),
            smtp_port,
            smtp_username: std::env::var("JOBREACH_SMTP_USERNAME").ok(),
            smtp_password: std::env::var("JOBREACH_SMTP_PASSWORD").ok(),
            transport,
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok(),
            gemini_base_url: env_or("JOBREACH_GEMINI_BASE_URL", crate::gemini::DEFAULT_BASE_URL),
            gemini_model: env_or("JOBREACH_GEMINI_MODEL", crate::gemini::DEFAULT_MODEL),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env_or("JOBREACH_OPENAI_BASE_URL", crate::openai::DEFAULT_BASE_URL),
            openai_model: env_or("JOBREACH_OPENAI_MODEL", crate::openai::DEFAULT_MODEL),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// `profile.yaml` on disk. Every field is optional; gaps are filled from the
/// resume profile, then from neutral placeholders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub link: Option<String>,
    pub job_role: Option<String>,
    pub resume: Option<PathBuf>,
}

pub fn load_sender_profile(
    profile_path: &Path,
    data_dir: &Path,
    role_override: Option<&str>,
) -> anyhow::Result<(SenderProfile, ResumeProfile)> {
    let file = read_profile_file(profile_path)?;
    let resume_path = file
        .resume
        .clone()
        .or_else(|| std::env::var("RESUME_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("resume.pdf"));

    let resume = match crate::resume::cached_profile(data_dir, &resume_path) {
        Ok(profile) => profile,
        Err(err) => {
            tracing::warn!(
                resume = %resume_path.display(),
                error = format!("{err:#}"),
                "resume profile unavailable; continuing with empty profile"
            );
            ResumeProfile::default()
        }
    };

    let sender = merge_profile(file, &resume, role_override, resume_path);
    Ok((sender, resume))
}

fn merge_profile(
    file: ProfileFile,
    resume: &ResumeProfile,
    role_override: Option<&str>,
    resume_path: PathBuf,
) -> SenderProfile {
    SenderProfile {
        name: file
            .name
            .or_else(|| resume.name.clone())
            .unwrap_or_else(|| "Your Name".to_owned()),
        email: file
            .email
            .or_else(|| resume.email.clone())
            .unwrap_or_default(),
        phone: file
            .phone
            .or_else(|| resume.phone.clone())
            .unwrap_or_default(),
        link: file.link.or_else(|| resume.link.clone()).unwrap_or_default(),
        job_role: role_override
            .map(str::to_owned)
            .or(file.job_role)
            .unwrap_or_else(|| DEFAULT_JOB_ROLE.to_owned()),
        resume_path,
    }
}

fn read_profile_file(path: &Path) -> anyhow::Result<ProfileFile> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(profile = %path.display(), "no profile file; using defaults");
            return Ok(ProfileFile::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read profile: {}", path.display()));
        }
    };
    serde_yaml::from_str(&raw).with_context(|| format!("parse profile: {}", path.display()))
}

pub fn show(args: ProfileShowArgs) -> anyhow::Result<()> {
    let (sender, resume) = load_sender_profile(
        Path::new(&args.profile),
        Path::new(&args.data_dir),
        args.role.as_deref(),
    )?;

    println!("name\t{}", sender.name);
    println!("email\t{}", sender.email);
    println!("phone\t{}", sender.phone);
    println!("link\t{}", sender.link);
    println!("job_role\t{}", sender.job_role);
    println!("resume\t{}", sender.resume_path.display());
    println!("skills\t{}", resume.skills.join(", "));
    println!("projects\t{}", resume.projects.join("; "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{DEFAULT_JOB_ROLE, ProfileFile, merge_profile, read_profile_file};
    use crate::model::ResumeProfile;

    fn resume_with_hints() -> ResumeProfile {
        ResumeProfile {
            name: Some("Jane Doe".to_owned()),
            email: Some("jane.doe@example.com".to_owned()),
            phone: Some("+1-555-123-4567".to_owned()),
            link: Some("linkedin.com/in/janedoe".to_owned()),
            ..ResumeProfile::default()
        }
    }

    #[test]
    fn profile_file_wins_over_resume_hints() {
        let file = ProfileFile {
            name: Some("J. Doe".to_owned()),
            email: None,
            phone: None,
            link: None,
            job_role: Some("Backend Engineer".to_owned()),
            resume: None,
        };
        let sender = merge_profile(
            file,
            &resume_with_hints(),
            None,
            PathBuf::from("resume.pdf"),
        );
        assert_eq!(sender.name, "J. Doe");
        assert_eq!(sender.email, "jane.doe@example.com");
        assert_eq!(sender.job_role, "Backend Engineer");
    }

    #[test]
    fn role_override_beats_profile_file() {
        let file = ProfileFile {
            job_role: Some("Backend Engineer".to_owned()),
            ..ProfileFile::default()
        };
        let sender = merge_profile(
            file,
            &ResumeProfile::default(),
            Some("Platform Engineer"),
            PathBuf::from("resume.pdf"),
        );
        assert_eq!(sender.job_role, "Platform Engineer");
    }

    #[test]
    fn empty_inputs_fall_back_to_placeholders() {
        let sender = merge_profile(
            ProfileFile::default(),
            &ResumeProfile::default(),
            None,
            PathBuf::from("resume.pdf"),
        );
        assert_eq!(sender.name, "Your Name");
        assert_eq!(sender.email, "");
        assert_eq!(sender.job_role, DEFAULT_JOB_ROLE);
    }

    #[test]
    fn reads_yaml_profile() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("profile.yaml");
        std::fs::write(
            &path,
            "name: Jane Doe\nemail: jane@example.com\njob_role: Site Reliability Engineer\nresume: cv.txt\n",
        )
        .unwrap();

        let file = read_profile_file(&path).unwrap();
        assert_eq!(file.name.as_deref(), Some("Jane Doe"));
        assert_eq!(file.resume.as_deref(), Some(std::path::Path::new("cv.txt")));

        let missing = read_profile_file(&temp.path().join("absent.yaml")).unwrap();
        assert!(missing.name.is_none());
    }
}
