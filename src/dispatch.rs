use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;

use crate::cli::{Engine, ResendArgs, SendArgs, TransportKind};
use crate::config::{self, Settings};
use crate::contacts::{self, ContactBook};
use crate::generate::Generator;
use crate::mailer::{ConsoleMailer, MailTransport, OutgoingEmail, ResumeAttachment, SmtpMailer};
use crate::model::{MessageSource, SendAttempt, SendStatus, SenderProfile};
use crate::send_log::SendLog;

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Pause between consecutive processed items. Never applied before the
    /// first item, after the last, or around skipped items.
    pub inter_item_delay: Duration,
    /// Skip recipients that already have a successful send on record.
    pub suppress_sent: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            inter_item_delay: Duration::from_secs(5),
            suppress_sent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub recipient: String,
    pub kind: OutcomeKind,
    pub source: Option<MessageSource>,
    pub subject: Option<String>,
    pub error_detail: Option<String>,
}

/// Seam for the inter-item pause so batch tests observe delays instead of
/// sleeping through them.
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self, delay: Duration);
}

pub struct TokioWaiter;

#[async_trait]
impl Waiter for TokioWaiter {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Walks a batch of recipients: generate, compose, send, record. Transport
/// failures are per-item and never abort the batch; only workspace write
/// failures do.
pub struct Dispatcher {
    generator: Generator,
    transport: Arc<dyn MailTransport>,
    send_log: SendLog,
    policy: DispatchPolicy,
    waiter: Arc<dyn Waiter>,
    stop: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        generator: Generator,
        transport: Arc<dyn MailTransport>,
        send_log: SendLog,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            generator,
            transport,
            send_log,
            policy,
            waiter: Arc::new(TokioWaiter),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_waiter(mut self, waiter: Arc<dyn Waiter>) -> Self {
        self.waiter = waiter;
        self
    }

    /// Shared flag checked between items; setting it finishes the current
    /// item and then stops.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub async fn run_batch(
        &self,
        recipients: &[String],
        attachment: &ResumeAttachment,
    ) -> anyhow::Result<Vec<ItemOutcome>> {
        if recipients.is_empty() {
            anyhow::bail!("batch has no recipients");
        }
        tracing::info!(
            recipients = recipients.len(),
            transport = self.transport.name(),
            "batch started"
        );

        let mut outcomes = Vec::with_capacity(recipients.len());
        let mut needs_delay = false;
        for recipient in recipients {
            if self.stop.load(Ordering::Relaxed) {
                tracing::warn!(
                    remaining = recipients.len() - outcomes.len(),
                    "batch stopped early"
                );
                break;
            }
            if self.policy.suppress_sent
                && self
                    .send_log
                    .has_sent(recipient)
                    .context("check send history")?
            {
                tracing::info!(recipient, "already sent; skipping");
                outcomes.push(ItemOutcome {
                    recipient: recipient.clone(),
                    kind: OutcomeKind::Skipped,
                    source: None,
                    subject: None,
                    error_detail: None,
                });
                continue;
            }
            if needs_delay {
                self.waiter.wait(self.policy.inter_item_delay).await;
            }
            outcomes.push(self.process_item(recipient, attachment).await?);
            needs_delay = true;
        }

        let sent = count(&outcomes, OutcomeKind::Sent);
        let failed = count(&outcomes, OutcomeKind::Failed);
        let skipped = count(&outcomes, OutcomeKind::Skipped);
        tracing::info!(sent, failed, skipped, "batch finished");
        Ok(outcomes)
    }

    async fn process_item(
        &self,
        recipient: &str,
        attachment: &ResumeAttachment,
    ) -> anyhow::Result<ItemOutcome> {
        let job_role = self.generator.sender().job_role.clone();
        tracing::debug!(recipient, job_role, "generating message");
        let message = self.generator.generate(recipient, &job_role).await;

        let sender = self.generator.sender();
        let email = OutgoingEmail {
            from_name: &sender.name,
            from_address: &sender.email,
            to: recipient,
            subject: &message.subject,
            body: &message.body,
            attachment: Some(attachment),
        };
        tracing::debug!(recipient, subject = %message.subject, "sending");
        let result = self.transport.send(&email).await;

        let (status, error_detail) = match &result {
            Ok(()) => (SendStatus::Sent, None),
            Err(err) => (SendStatus::Failed, Some(err.to_string())),
        };
        let attempt = SendAttempt {
            recipient: recipient.to_owned(),
            timestamp: Utc::now(),
            status,
            error_detail: error_detail.clone(),
            message_source: message.source,
            subject: message.subject.clone(),
        };
        self.send_log
            .append(&attempt)
            .context("record send attempt")?;

        match status {
            SendStatus::Sent => {
                tracing::info!(recipient, source = %message.source, "sent");
            }
            SendStatus::Failed => {
                tracing::warn!(
                    recipient,
                    error = error_detail.as_deref().unwrap_or_default(),
                    "send failed; continuing batch"
                );
            }
        }

        Ok(ItemOutcome {
            recipient: recipient.to_owned(),
            kind: match status {
                SendStatus::Sent => OutcomeKind::Sent,
                SendStatus::Failed => OutcomeKind::Failed,
            },
            source: Some(message.source),
            subject: Some(message.subject),
            error_detail,
        })
    }
}

fn count(outcomes: &[ItemOutcome], kind: OutcomeKind) -> usize {
    outcomes.iter().filter(|o| o.kind == kind).count()
}

fn build_transport(
    flag: Option<TransportKind>,
    settings: &Settings,
    sender: &SenderProfile,
) -> anyhow::Result<Arc<dyn MailTransport>> {
    let kind = flag.or(settings.transport).unwrap_or(TransportKind::Smtp);
    match kind {
        TransportKind::Console => Ok(Arc::new(ConsoleMailer)),
        TransportKind::Smtp => {
            let username = settings
                .smtp_username
                .clone()
                .or_else(|| (!sender.email.is_empty()).then(|| sender.email.clone()))
                .context("smtp username not configured (set JOBREACH_SMTP_USERNAME)")?;
            let password = settings
                .smtp_password
                .clone()
                .context("smtp password not configured (set JOBREACH_SMTP_PASSWORD)")?;
            let mailer =
                SmtpMailer::new(&settings.smtp_host, settings.smtp_port, &username, &password)?;
            Ok(Arc::new(mailer))
        }
    }
}

fn prepare(
    data_dir: &Path,
    profile_path: &Path,
    role: Option<&str>,
    engine: Engine,
    transport_flag: Option<TransportKind>,
    policy: DispatchPolicy,
) -> anyhow::Result<(Dispatcher, ResumeAttachment)> {
    let settings = Settings::from_env().context("load settings")?;
    let (sender, resume) =
        config::load_sender_profile(profile_path, data_dir, role).context("load sender profile")?;
    let attachment =
        ResumeAttachment::load(&sender.resume_path).context("load resume attachment")?;
    let provider = crate::llm::provider_for(engine, &settings)?;
    let transport = build_transport(transport_flag, &settings, &sender)?;
    let send_log = SendLog::open(data_dir);
    let generator = Generator::new(provider, sender, resume);
    Ok((Dispatcher::new(generator, transport, send_log, policy), attachment))
}

pub async fn send(args: SendArgs) -> anyhow::Result<()> {
    let book = ContactBook::open(&args.data_dir);
    let recipients: Vec<String> = book
        .list()?
        .into_iter()
        .map(|record| record.address)
        .collect();
    if recipients.is_empty() {
        anyhow::bail!("contact book is empty; add recipients first");
    }

    let policy = DispatchPolicy {
        inter_item_delay: Duration::from_secs(args.delay_secs),
        suppress_sent: args.skip_sent,
    };
    let (dispatcher, attachment) = prepare(
        Path::new(&args.data_dir),
        Path::new(&args.profile),
        args.role.as_deref(),
        args.engine,
        args.transport,
        policy,
    )?;

    let stop = dispatcher.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing current item");
            stop.store(true, Ordering::Relaxed);
        }
    });

    let outcomes = dispatcher.run_batch(&recipients, &attachment).await?;
    print_outcomes(&outcomes);
    Ok(())
}

/// One-off send that ignores suppression and the inter-item delay.
pub async fn resend(args: ResendArgs) -> anyhow::Result<()> {
    let recipient = contacts::normalize_address(&args.to);
    if !contacts::is_valid_address(&recipient) {
        anyhow::bail!("invalid email address: {}", args.to);
    }

    let policy = DispatchPolicy {
        inter_item_delay: Duration::ZERO,
        suppress_sent: false,
    };
    let (dispatcher, attachment) = prepare(
        Path::new(&args.data_dir),
        Path::new(&args.profile),
        args.role.as_deref(),
        args.engine,
        args.transport,
        policy,
    )?;

    let outcomes = dispatcher
        .run_batch(std::slice::from_ref(&recipient), &attachment)
        .await?;
    print_outcomes(&outcomes);
    Ok(())
}

fn print_outcomes(outcomes: &[ItemOutcome]) {
    for outcome in outcomes {
        match outcome.kind {
            OutcomeKind::Sent => println!(
                "sent\t{}\t{}",
                outcome.recipient,
                outcome.subject.as_deref().unwrap_or_default()
            ),
            OutcomeKind::Failed => println!(
                "failed\t{}\t{}",
                outcome.recipient,
                outcome.error_detail.as_deref().unwrap_or_default()
            ),
            OutcomeKind::Skipped => println!("skipped\t{}", outcome.recipient),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use lettre::message::header::ContentType;

    use super::{DispatchPolicy, Dispatcher, OutcomeKind, Waiter};
    use crate::generate::Generator;
    use crate::mailer::{MailTransport, OutgoingEmail, ResumeAttachment, TransportError};
    use crate::model::{
        MessageSource, ResumeProfile, SendAttempt, SendStatus, SenderProfile,
    };
    use crate::send_log::SendLog;

    struct FakeTransport {
        fail_for: Vec<String>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(fail_for: &[&str]) -> Self {
            Self {
                fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MailTransport for FakeTransport {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn send(&self, email: &OutgoingEmail<'_>) -> Result<(), TransportError> {
            if self.fail_for.iter().any(|addr| addr == email.to) {
                return Err(TransportError::Rejected("mailbox unavailable".to_owned()));
            }
            self.sent.lock().unwrap().push(email.to.to_owned());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWaiter {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Waiter for RecordingWaiter {
        async fn wait(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    struct StopOnWait {
        stop: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Waiter for StopOnWait {
        async fn wait(&self, _delay: Duration) {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    fn generator() -> Generator {
        let sender = SenderProfile {
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
            phone: "+1-555-123-4567".to_owned(),
            link: String::new(),
            job_role: "Software Engineering".to_owned(),
            resume_path: PathBuf::from("resume.txt"),
        };
        let resume = ResumeProfile {
            skills: vec!["Rust".to_owned()],
            ..ResumeProfile::default()
        };
        Generator::new(None, sender, resume)
    }

    fn attachment() -> ResumeAttachment {
        ResumeAttachment {
            filename: "resume.txt".to_owned(),
            bytes: b"plain resume".to_vec(),
            content_type: ContentType::parse("text/plain").unwrap(),
        }
    }

    fn recipients(addresses: &[&str]) -> Vec<String> {
        addresses.iter().map(|s| s.to_string()).collect()
    }

    fn policy(delay: Duration, suppress_sent: bool) -> DispatchPolicy {
        DispatchPolicy {
            inter_item_delay: delay,
            suppress_sent,
        }
    }

    #[tokio::test]
    async fn batch_waits_between_items_but_not_around_them() {
        let temp = tempfile::TempDir::new().unwrap();
        let delay = Duration::from_millis(7);
        let waiter = Arc::new(RecordingWaiter::default());
        let dispatcher = Dispatcher::new(
            generator(),
            Arc::new(FakeTransport::new(&[])),
            SendLog::open(temp.path()),
            policy(delay, false),
        )
        .with_waiter(Arc::clone(&waiter) as Arc<dyn Waiter>);

        let batch = recipients(&["a@acme.com", "b@acme.com", "c@acme.com"]);
        let outcomes = dispatcher.run_batch(&batch, &attachment()).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.kind == OutcomeKind::Sent));
        assert_eq!(*waiter.delays.lock().unwrap(), vec![delay, delay]);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let temp = tempfile::TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            generator(),
            Arc::new(FakeTransport::new(&["c@acme.com"])),
            SendLog::open(temp.path()),
            policy(Duration::ZERO, false),
        )
        .with_waiter(Arc::new(RecordingWaiter::default()));

        let batch = recipients(&[
            "a@acme.com",
            "b@acme.com",
            "c@acme.com",
            "d@acme.com",
            "e@acme.com",
        ]);
        let outcomes = dispatcher.run_batch(&batch, &attachment()).await.unwrap();

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[2].kind, OutcomeKind::Failed);
        assert!(
            outcomes[2]
                .error_detail
                .as_deref()
                .unwrap()
                .contains("mailbox unavailable")
        );
        assert!(outcomes[3..].iter().all(|o| o.kind == OutcomeKind::Sent));

        let attempts = SendLog::open(temp.path()).all().unwrap();
        assert_eq!(attempts.len(), 5);
        assert_eq!(attempts[2].status, SendStatus::Failed);
        assert_eq!(attempts[4].status, SendStatus::Sent);
    }

    #[tokio::test]
    async fn suppression_skips_previously_sent_without_delay_or_record() {
        let temp = tempfile::TempDir::new().unwrap();
        let log = SendLog::open(temp.path());
        log.append(&SendAttempt {
            recipient: "b@acme.com".to_owned(),
            timestamp: Utc::now(),
            status: SendStatus::Sent,
            error_detail: None,
            message_source: MessageSource::FallbackTemplate,
            subject: "earlier".to_owned(),
        })
        .unwrap();

        let delay = Duration::from_millis(7);
        let waiter = Arc::new(RecordingWaiter::default());
        let dispatcher = Dispatcher::new(
            generator(),
            Arc::new(FakeTransport::new(&[])),
            log.clone(),
            policy(delay, true),
        )
        .with_waiter(Arc::clone(&waiter) as Arc<dyn Waiter>);

        let batch = recipients(&["a@acme.com", "b@acme.com", "c@acme.com"]);
        let outcomes = dispatcher.run_batch(&batch, &attachment()).await.unwrap();

        let kinds: Vec<OutcomeKind> = outcomes.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OutcomeKind::Sent, OutcomeKind::Skipped, OutcomeKind::Sent]
        );
        assert_eq!(waiter.delays.lock().unwrap().len(), 1);
        assert_eq!(log.all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stop_flag_finishes_current_item_then_breaks() {
        let temp = tempfile::TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            generator(),
            Arc::new(FakeTransport::new(&[])),
            SendLog::open(temp.path()),
            policy(Duration::from_millis(7), false),
        );
        let stop = dispatcher.stop_flag();
        let dispatcher = dispatcher.with_waiter(Arc::new(StopOnWait { stop }));

        let batch = recipients(&["a@acme.com", "b@acme.com", "c@acme.com"]);
        let outcomes = dispatcher.run_batch(&batch, &attachment()).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.kind == OutcomeKind::Sent));
    }

    #[tokio::test]
    async fn empty_batch_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            generator(),
            Arc::new(FakeTransport::new(&[])),
            SendLog::open(temp.path()),
            DispatchPolicy::default(),
        );

        let err = dispatcher
            .run_batch(&[], &attachment())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("no recipients"));
    }
}
