use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Transport failures, split by what the caller can do about them. All of
/// them fail only the current item; the batch keeps going.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("smtp authentication failed: {0}")]
    Auth(String),
    #[error("smtp connection failed: {0}")]
    Connection(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Resume bytes read once per batch and attached to every message.
pub struct ResumeAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
}

impl ResumeAttachment {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read resume {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume".to_owned());
        let content_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some("pdf") => ContentType::parse("application/pdf"),
            Some("txt") => ContentType::parse("text/plain"),
            _ => ContentType::parse("application/octet-stream"),
        }
        .context("parse attachment content type")?;
        Ok(Self {
            filename,
            bytes,
            content_type,
        })
    }
}

pub struct OutgoingEmail<'a> {
    pub from_name: &'a str,
    pub from_address: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub attachment: Option<&'a ResumeAttachment>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, email: &OutgoingEmail<'_>) -> Result<(), TransportError>;
}

/// Builds the RFC 5322 message. Shared by both transports so console runs
/// validate addressing the same way real sends do.
pub fn compose(email: &OutgoingEmail<'_>) -> Result<Message, TransportError> {
    let from: Mailbox = if email.from_name.is_empty() {
        email.from_address.parse()
    } else {
        format!("{} <{}>", email.from_name, email.from_address).parse()
    }
    .map_err(|err| TransportError::InvalidMessage(format!("from address: {err}")))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|err| TransportError::InvalidMessage(format!("to address: {err}")))?;

    let builder = Message::builder().from(from).to(to).subject(email.subject);
    let message = match email.attachment {
        Some(attachment) => builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(email.body.to_owned()))
                .singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.bytes.clone(), attachment.content_type.clone()),
                ),
        ),
        None => builder.body(email.body.to_owned()),
    }
    .map_err(|err| TransportError::InvalidMessage(err.to_string()))?;
    Ok(message)
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("smtp relay {host}"))?
            .port(port)
            .credentials(Credentials::new(username.to_owned(), password.to_owned()))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail<'_>) -> Result<(), TransportError> {
        let message = compose(email)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> TransportError {
    let Some(code) = err.status() else {
        return TransportError::Connection(err.to_string());
    };
    match code.to_string().as_str() {
        "530" | "534" | "535" | "538" => TransportError::Auth(err.to_string()),
        code if code.starts_with("55") => TransportError::Rejected(err.to_string()),
        _ => TransportError::Connection(err.to_string()),
    }
}

/// Prints composed messages to stdout instead of delivering them. Useful for
/// dry runs and covered by the pipeline tests.
pub struct ConsoleMailer;

#[async_trait]
impl MailTransport for ConsoleMailer {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, email: &OutgoingEmail<'_>) -> Result<(), TransportError> {
        compose(email)?;
        println!("--- console transport ---");
        println!("To: {}", email.to);
        println!("Subject: {}", email.subject);
        if let Some(attachment) = email.attachment {
            println!(
                "Attachment: {} ({} bytes)",
                attachment.filename,
                attachment.bytes.len()
            );
        }
        println!();
        println!("{}", email.body);
        println!("--- end ---");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lettre::message::header::ContentType;

    use super::{ConsoleMailer, MailTransport, OutgoingEmail, ResumeAttachment, compose};

    fn attachment() -> ResumeAttachment {
        ResumeAttachment {
            filename: "resume.txt".to_owned(),
            bytes: b"plain resume".to_vec(),
            content_type: ContentType::parse("text/plain").unwrap(),
        }
    }

    fn email<'a>(attachment: Option<&'a ResumeAttachment>) -> OutgoingEmail<'a> {
        OutgoingEmail {
            from_name: "Jane Doe",
            from_address: "jane@example.com",
            to: "hr@acme.com",
            subject: "Application for Software Engineering Position at Acme",
            body: "Dear Hiring Manager,\n\nPlease find my resume attached.\n",
            attachment,
        }
    }

    #[test]
    fn compose_includes_subject_and_attachment() {
        let attachment = attachment();
        let message = compose(&email(Some(&attachment))).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("Application for Software Engineering Position at Acme"));
        assert!(raw.contains("resume.txt"));
    }

    #[test]
    fn compose_rejects_malformed_recipient() {
        let attachment = attachment();
        let mut email = email(Some(&attachment));
        email.to = "not an address";
        assert!(compose(&email).is_err());
    }

    #[tokio::test]
    async fn console_transport_accepts_plain_message() {
        ConsoleMailer.send(&email(None)).await.unwrap();
    }
}
