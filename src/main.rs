use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    jobreach::logging::init().context("init logging")?;

    let cli = jobreach::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        jobreach::cli::Command::Contact {
            command: jobreach::cli::ContactCommand::Add(args),
        } => {
            jobreach::contacts::add(args).context("contact add")?;
        }
        jobreach::cli::Command::Contact {
            command: jobreach::cli::ContactCommand::List(args),
        } => {
            jobreach::contacts::list(args).context("contact list")?;
        }
        jobreach::cli::Command::Contact {
            command: jobreach::cli::ContactCommand::Prune(args),
        } => {
            jobreach::contacts::prune(args).context("contact prune")?;
        }
        jobreach::cli::Command::Scrape(args) => {
            jobreach::scrape::run(args).await.context("scrape")?;
        }
        jobreach::cli::Command::Send(args) => {
            jobreach::dispatch::send(args).await.context("send")?;
        }
        jobreach::cli::Command::Resend(args) => {
            jobreach::dispatch::resend(args).await.context("resend")?;
        }
        jobreach::cli::Command::Preview(args) => {
            jobreach::generate::preview(args).await.context("preview")?;
        }
        jobreach::cli::Command::History(args) => {
            jobreach::send_log::history(args).context("history")?;
        }
        jobreach::cli::Command::Report(args) => {
            jobreach::report::run(args).context("report")?;
        }
        jobreach::cli::Command::Profile(args) => {
            jobreach::config::show(args).context("profile")?;
        }
    }

    Ok(())
}
