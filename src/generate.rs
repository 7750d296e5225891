use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::PreviewArgs;
use crate::config::{self, Settings};
use crate::llm::CompletionProvider;
use crate::model::{GeneratedMessage, MessageSource, ResumeProfile, SenderProfile};

/// Token cap per completion, roughly a 250-word email.
pub const MAX_COMPLETION_TOKENS: u32 = 300;

/// Completions with less body than this are treated as unusable.
const MIN_BODY_CHARS: usize = 80;

const MAX_PROMPT_SKILLS: usize = 12;
const MAX_PROMPT_PROJECTS: usize = 4;

/// Builds one message per recipient. A configured provider is tried first;
/// any failure or unusable completion degrades to the deterministic fallback
/// template, so `generate` itself never fails.
pub struct Generator {
    provider: Option<Arc<dyn CompletionProvider>>,
    sender: SenderProfile,
    resume: ResumeProfile,
}

impl Generator {
    pub fn new(
        provider: Option<Arc<dyn CompletionProvider>>,
        sender: SenderProfile,
        resume: ResumeProfile,
    ) -> Self {
        Self {
            provider,
            sender,
            resume,
        }
    }

    pub fn sender(&self) -> &SenderProfile {
        &self.sender
    }

    pub async fn generate(&self, recipient: &str, job_role: &str) -> GeneratedMessage {
        let company = company_from_address(recipient);

        if let Some(provider) = self.provider.as_deref() {
            let prompt = self.build_prompt(company.as_deref(), job_role);
            match provider.complete(&prompt, MAX_COMPLETION_TOKENS).await {
                Ok(text) => {
                    if let Some((subject, body)) = parse_completion(&text) {
                        tracing::debug!(
                            provider = provider.name(),
                            recipient,
                            "completion accepted"
                        );
                        return GeneratedMessage {
                            subject,
                            body,
                            source: MessageSource::AiGenerated,
                        };
                    }
                    tracing::warn!(
                        provider = provider.name(),
                        recipient,
                        "unusable completion; using fallback template"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        recipient,
                        error = %err,
                        "completion failed; using fallback template"
                    );
                }
            }
        }

        self.fallback(company.as_deref(), job_role)
    }

    fn build_prompt(&self, company: Option<&str>, job_role: &str) -> String {
        let company_label = company.unwrap_or("the company");
        let mut prompt = format!(
            "Write a professional job application email for the {job_role} position at \
             {company_label}.\n\nApplicant:\n- Name: {}\n",
            self.sender.name
        );
        if !self.sender.email.is_empty() {
            prompt.push_str(&format!("- Email: {}\n", self.sender.email));
        }
        if !self.sender.phone.is_empty() {
            prompt.push_str(&format!("- Phone: {}\n", self.sender.phone));
        }
        if !self.sender.link.is_empty() {
            prompt.push_str(&format!("- LinkedIn: {}\n", self.sender.link));
        }

        if !self.resume.skills.is_empty() {
            let skills: Vec<&str> = self
                .resume
                .skills
                .iter()
                .take(MAX_PROMPT_SKILLS)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!("\nKey skills: {}\n", skills.join(", ")));
        }
        if !self.resume.projects.is_empty() {
            let projects: Vec<&str> = self
                .resume
                .projects
                .iter()
                .take(MAX_PROMPT_PROJECTS)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!("Projects: {}\n", projects.join("; ")));
        }
        if !self.resume.excerpt.is_empty() {
            prompt.push_str(&format!("\nResume excerpt:\n{}\n", self.resume.excerpt));
        }

        prompt.push_str(
            "\nRequirements:\n\
             - The first line must be the subject line, prefixed with \"Subject:\".\n\
             - Highlight the most relevant skills and projects.\n\
             - Mention that the resume is attached.\n\
             - Close with the applicant's name and contact details.\n\
             - Keep the email under 250 words and output nothing but the email.\n",
        );
        prompt
    }

    /// Deterministic substitution; identical inputs always produce
    /// byte-identical output.
    pub fn fallback(&self, company: Option<&str>, job_role: &str) -> GeneratedMessage {
        let company_label = company.unwrap_or("your organization");
        let subject = fallback_subject(company, job_role);

        let mut body = format!(
            "Dear Hiring Manager,\n\n\
             I am writing to express my strong interest in the {job_role} position at \
             {company_label}. With my background and skills, I am confident I would be a \
             valuable addition to your team.\n\n"
        );
        if !self.resume.skills.is_empty() {
            let skills: Vec<&str> = self
                .resume
                .skills
                .iter()
                .take(MAX_PROMPT_SKILLS)
                .map(String::as_str)
                .collect();
            body.push_str(&format!("My experience includes {}.\n\n", skills.join(", ")));
        }
        body.push_str(
            "My resume is attached for your review. I would welcome the opportunity to \
             discuss how my experience aligns with your needs.\n\n\
             Thank you for your time and consideration.\n\n",
        );
        body.push_str(&format!("Best regards,\n{}\n", self.sender.name));
        if !self.sender.email.is_empty() {
            body.push_str(&format!("Email: {}\n", self.sender.email));
        }
        if !self.sender.phone.is_empty() {
            body.push_str(&format!("Phone: {}\n", self.sender.phone));
        }
        if !self.sender.link.is_empty() {
            body.push_str(&format!("LinkedIn: {}\n", self.sender.link));
        }

        GeneratedMessage {
            subject,
            body,
            source: MessageSource::FallbackTemplate,
        }
    }
}

pub fn fallback_subject(company: Option<&str>, job_role: &str) -> String {
    match company {
        Some(company) => format!("Application for {job_role} Position at {company}"),
        None => format!("Application for {job_role} Position"),
    }
}

/// First label of the recipient's domain, capitalized. Labels that cannot
/// read as a name (empty, numeric, punycode) yield `None` and callers use a
/// generic phrasing instead.
pub fn company_from_address(address: &str) -> Option<String> {
    let (_, domain) = address.split_once('@')?;
    let label = domain.split('.').next()?;
    if label.is_empty()
        || label.starts_with("xn--")
        || label.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut chars = label.chars();
    let first = chars.next()?;
    Some(
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    )
}

/// Splits a completion into (subject, body): the first non-empty line is the
/// subject (a `Subject:` prefix and markdown emphasis are stripped), the rest
/// is the body. Returns `None` when the shape is unusable.
fn parse_completion(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let mut lines = text.lines();
    let first = lines.find(|line| !line.trim().is_empty())?;

    let subject = clean_subject_line(first);
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_owned();

    if subject.is_empty() || body.chars().count() < MIN_BODY_CHARS {
        return None;
    }
    Some((subject, body))
}

fn clean_subject_line(line: &str) -> String {
    let line = line.trim().trim_matches('*').trim().trim_matches('#').trim();
    let stripped = match line.get(.."Subject:".len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case("subject:") => &line["Subject:".len()..],
        _ => line,
    };
    stripped.trim().trim_matches('*').trim().to_owned()
}

pub async fn preview(args: PreviewArgs) -> anyhow::Result<()> {
    let recipient = crate::contacts::normalize_address(&args.to);
    if !crate::contacts::is_valid_address(&recipient) {
        anyhow::bail!("invalid email address: {}", args.to);
    }

    let settings = Settings::from_env().context("load settings")?;
    let (sender, resume) = config::load_sender_profile(
        Path::new(&args.profile),
        Path::new(&args.data_dir),
        args.role.as_deref(),
    )
    .context("load sender profile")?;
    let provider = crate::llm::provider_for(args.engine, &settings)?;

    let generator = Generator::new(provider, sender, resume);
    let job_role = generator.sender().job_role.clone();
    let message = generator.generate(&recipient, &job_role).await;

    println!("To: {recipient}");
    println!("Subject: {}", message.subject);
    println!("Source: {}", message.source);
    println!();
    println!("{}", message.body);
    Ok(())
}
