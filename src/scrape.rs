use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::cli::ScrapeArgs;
use crate::contacts::{self, AddOutcome, ContactBook};

/// Pulls every address-shaped string out of a page, mailto targets included.
/// Lowercased, deduplicated, page order preserved.
pub fn harvest_addresses(html: &str) -> Vec<String> {
    static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
    });

    let mut addresses = Vec::new();
    for found in ADDRESS_RE.find_iter(html) {
        let address = found.as_str().to_ascii_lowercase();
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    addresses
}

pub async fn run(args: ScrapeArgs) -> anyhow::Result<()> {
    let url = Url::parse(&args.url).context("parse --url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("--url must be http/https: {url}");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("build scrape http client")?;
    let response = client
        .get(url.clone())
        .header(USER_AGENT, "jobreach/0.1")
        .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("GET {url} returned {}", response.status());
    }
    let html = response.text().await.context("read response body")?;

    let addresses = harvest_addresses(&html);
    let book = ContactBook::open(&args.data_dir);
    let mut added = 0usize;
    let mut duplicate = 0usize;
    let mut invalid = 0usize;
    for address in &addresses {
        if !contacts::is_valid_address(address) {
            invalid += 1;
            continue;
        }
        match book.add(address)? {
            AddOutcome::Inserted => added += 1,
            AddOutcome::Duplicate => duplicate += 1,
        }
    }

    tracing::info!(url = %url, found = addresses.len(), added, "scrape finished");
    println!(
        "found {}, added {}, duplicate {}, invalid {}",
        addresses.len(),
        added,
        duplicate,
        invalid
    );
    Ok(())
}
