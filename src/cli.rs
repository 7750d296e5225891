use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Contact {
        #[command(subcommand)]
        command: ContactCommand,
    },
    Scrape(ScrapeArgs),
    Send(SendArgs),
    Resend(ResendArgs),
    Preview(PreviewArgs),
    History(HistoryArgs),
    Report(ReportArgs),
    Profile(ProfileShowArgs),
}

#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    Add(ContactAddArgs),
    List(ContactListArgs),
    Prune(ContactPruneArgs),
}

/// Generation engine for message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Prefer Gemini, then OpenAI, then the fallback template.
    Auto,
    Gemini,
    Openai,
    /// Skip providers entirely; every message uses the fallback template.
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Smtp,
    Console,
}

impl TransportKind {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "smtp" => Ok(Self::Smtp),
            "console" => Ok(Self::Console),
            other => anyhow::bail!("unsupported transport: {other}"),
        }
    }
}

#[derive(Debug, Args)]
pub struct ContactAddArgs {
    /// Recipient email address.
    #[arg(long)]
    pub address: String,

    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,
}

#[derive(Debug, Args)]
pub struct ContactListArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,
}

#[derive(Debug, Args)]
pub struct ContactPruneArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Page URL to harvest addresses from (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Sender profile YAML file.
    #[arg(long, default_value = "profile.yaml")]
    pub profile: String,

    /// Target job role (overrides the profile value).
    #[arg(long)]
    pub role: Option<String>,

    /// Generation engine.
    #[arg(long, value_enum, default_value_t = Engine::Auto)]
    pub engine: Engine,

    /// Mail transport (overrides JOBREACH_TRANSPORT).
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Delay between consecutive sends, in seconds.
    #[arg(long, default_value_t = 5)]
    pub delay_secs: u64,

    /// Skip recipients that already have a successful send on record.
    #[arg(long)]
    pub skip_sent: bool,
}

#[derive(Debug, Args)]
pub struct ResendArgs {
    /// Recipient email address to send to again.
    #[arg(long)]
    pub to: String,

    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Sender profile YAML file.
    #[arg(long, default_value = "profile.yaml")]
    pub profile: String,

    /// Target job role (overrides the profile value).
    #[arg(long)]
    pub role: Option<String>,

    /// Generation engine.
    #[arg(long, value_enum, default_value_t = Engine::Auto)]
    pub engine: Engine,

    /// Mail transport (overrides JOBREACH_TRANSPORT).
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Recipient email address to preview a message for.
    #[arg(long)]
    pub to: String,

    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Sender profile YAML file.
    #[arg(long, default_value = "profile.yaml")]
    pub profile: String,

    /// Target job role (overrides the profile value).
    #[arg(long)]
    pub role: Option<String>,

    /// Generation engine.
    #[arg(long, value_enum, default_value_t = Engine::Auto)]
    pub engine: Engine,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Show only attempts for this recipient.
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum attempts to display (newest last).
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Recent attempts to include in the report.
    #[arg(long, default_value_t = 10)]
    pub recent: usize,
}

#[derive(Debug, Args)]
pub struct ProfileShowArgs {
    /// Workspace directory holding the contact book and send log.
    #[arg(long, default_value = "workspace")]
    pub data_dir: String,

    /// Sender profile YAML file.
    #[arg(long, default_value = "profile.yaml")]
    pub profile: String,

    /// Target job role (overrides the profile value).
    #[arg(long)]
    pub role: Option<String>,
}
