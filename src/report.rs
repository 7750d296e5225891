use crate::cli::ReportArgs;
use crate::contacts::ContactBook;
use crate::model::SendStatus;
use crate::send_log::SendLog;

/// Campaign summary: contact count, attempt totals, success rate, and the
/// most recent attempts newest first.
pub fn run(args: ReportArgs) -> anyhow::Result<()> {
    let contacts = ContactBook::open(&args.data_dir).count()?;
    let attempts = SendLog::open(&args.data_dir).all()?;

    let sent = attempts
        .iter()
        .filter(|a| a.status == SendStatus::Sent)
        .count();
    let failed = attempts.len() - sent;
    let rate = if attempts.is_empty() {
        0.0
    } else {
        sent as f64 * 100.0 / attempts.len() as f64
    };

    println!("contacts: {contacts}");
    println!("attempts: {} (sent {sent}, failed {failed})", attempts.len());
    println!("success rate: {rate:.1}%");

    for attempt in attempts.iter().rev().take(args.recent) {
        println!(
            "{}\t{}\t{}\t{}",
            attempt.timestamp.to_rfc3339(),
            attempt.status,
            attempt.recipient,
            attempt.subject,
        );
    }
    tracing::info!(contacts, attempts = attempts.len(), sent, "report generated");
    Ok(())
}
