use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::input::UrlEntry;
use crate::output::{OutputWriter, PageRecord};
use crate::retry::{resolve_entry, Resolution, Resolved};
use crate::scraper::{ScrapeClient, ScrapedPage};
use crate::summary::{RunOutcome, RunSummary, Status};

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Print the per-entry line above the bar and record the outcome.
fn report(pb: &ProgressBar, summary: &mut RunSummary, outcome: RunOutcome) {
    let line = match outcome.status {
        Status::Success => format!("✓ {} -> {}", outcome.name, outcome.detail),
        Status::SuccessAfterRetry => format!("↻ {} -> {} (retried)", outcome.name, outcome.detail),
        Status::Failure => format!("✗ {}: {}", outcome.name, outcome.detail),
    };
    pb.suspend(|| println!("{}", line));
    summary.record(outcome);
    pb.inc(1);
}

fn finish(pb: ProgressBar, summary: RunSummary) -> RunSummary {
    pb.finish_and_clear();
    info!(
        "Processed {} entries ({} failed)",
        summary.processed(),
        summary.count(Status::Failure)
    );
    summary
}

/// Scrape every entry in order, one at a time, writing each result as it lands.
pub async fn run<C: ScrapeClient>(
    client: &C,
    entries: &[UrlEntry],
    writer: &OutputWriter,
    force_enhanced: bool,
) -> Result<RunSummary> {
    let pb = progress_bar(entries.len())?;
    let mut summary = RunSummary::default();
    for entry in entries {
        pb.set_message(entry.name.clone());
        let resolved = resolve_entry(client, entry, force_enhanced).await;
        // Writing may log; keep it off the bar.
        let outcome = pb.suspend(|| finish_entry(writer, entry, resolved));
        report(&pb, &mut summary, outcome);
    }
    Ok(finish(pb, summary))
}

/// Crawl from every entry's URL and write each discovered page as
/// `<name>_<n>.md`. No completeness retry in this mode.
pub async fn run_crawl<C: ScrapeClient>(
    client: &C,
    entries: &[UrlEntry],
    writer: &OutputWriter,
    limit: u32,
) -> Result<RunSummary> {
    let pb = progress_bar(entries.len())?;
    let mut summary = RunSummary::default();
    for entry in entries {
        pb.set_message(entry.name.clone());
        let crawled = client.crawl(&entry.url, limit).await;
        let outcome = pb.suspend(|| match crawled {
            Ok(pages) => write_crawl(writer, entry, &pages),
            Err(failure) => {
                warn!("{} ({}) crawl failed: {}", entry.name, entry.url, failure);
                failed(entry, failure.to_string())
            }
        });
        report(&pb, &mut summary, outcome);
    }
    Ok(finish(pb, summary))
}

fn failed(entry: &UrlEntry, detail: String) -> RunOutcome {
    RunOutcome {
        name: entry.name.clone(),
        status: Status::Failure,
        detail,
    }
}

fn write_crawl(writer: &OutputWriter, entry: &UrlEntry, pages: &[ScrapedPage]) -> RunOutcome {
    if pages.is_empty() {
        return failed(entry, "crawl returned no pages".to_string());
    }

    let scraped_at = Utc::now();
    for (i, page) in pages.iter().enumerate() {
        let name = format!("{} {}", entry.name, i + 1);
        let record = PageRecord {
            name: &name,
            url: page.source_url.as_deref().unwrap_or(&entry.url),
            title: page.title.as_deref(),
            status_code: page.status_code,
            attempts: 1,
            enhanced: false,
            scraped_at,
            markdown: &page.markdown,
        };
        if let Err(e) = writer.write(&record) {
            warn!("{}: crawled {} pages but could not save them: {}", entry.name, pages.len(), e);
            return failed(entry, e.to_string());
        }
    }

    RunOutcome {
        name: entry.name.clone(),
        status: Status::Success,
        detail: format!("{} pages in {}", pages.len(), writer.dir().display()),
    }
}

fn finish_entry(writer: &OutputWriter, entry: &UrlEntry, resolved: Resolved) -> RunOutcome {
    let Resolved {
        resolution,
        attempts,
        enhanced,
    } = resolved;
    let (status, page) = match resolution {
        Resolution::Complete(page) => (Status::Success, page),
        Resolution::Retried(page) => (Status::SuccessAfterRetry, page),
        Resolution::Failed(failure) => {
            warn!("{} ({}) failed after {} attempt(s): {}", entry.name, entry.url, attempts, failure);
            return failed(entry, failure.to_string());
        }
    };

    let record = PageRecord {
        name: &entry.name,
        url: &entry.url,
        title: page.title.as_deref(),
        status_code: page.status_code,
        attempts,
        enhanced,
        scraped_at: Utc::now(),
        markdown: &page.markdown,
    };
    match writer.write(&record) {
        Ok(path) => {
            let mut detail = path.display().to_string();
            if let Some(title) = &page.title {
                detail.push_str(&format!(" [{}]", title));
            }
            RunOutcome {
                name: entry.name.clone(),
                status,
                detail,
            }
        }
        Err(e) => {
            warn!("{}: scraped but not saved: {}", entry.name, e);
            failed(entry, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeFailure;
    use crate::input::parse_entries;
    use crate::retry::tests::{complete_md, thin_md, FakeClient};
    use crate::scraper::ScrapeOptions;

    #[tokio::test]
    async fn two_entries_and_a_comment() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = parse_entries("# list\nAlpha, https://a.test\nBeta Site, https://b.test\n");
        let client = FakeClient::new(vec![Ok(complete_md()), Ok(complete_md())]);
        let writer = OutputWriter::new(tmp.path());

        let summary = run(&client, &loaded.entries, &writer, false).await.unwrap();

        assert!(client.call_count() >= 2);
        assert_eq!(summary.processed(), 2);
        assert_eq!(summary.count(Status::Success), 2);
        assert_eq!(summary.exit_code(), 0);
        assert!(tmp.path().join("alpha.md").exists());
        assert!(tmp.path().join("beta_site.md").exists());
    }

    #[tokio::test]
    async fn thin_page_retried_and_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = parse_entries("Thin, https://thin.test").entries;
        let client = FakeClient::new(vec![Ok(thin_md()), Ok("still thin".into())]);
        let writer = OutputWriter::new(tmp.path());

        let summary = run(&client, &entries, &writer, false).await.unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(client.calls.borrow()[1].1, ScrapeOptions::ENHANCED);
        assert_eq!(summary.outcomes()[0].status, Status::SuccessAfterRetry);
        assert_eq!(std::fs::read_to_string(tmp.path().join("thin.md")).unwrap(), "still thin");
    }

    #[tokio::test]
    async fn auth_failure_fails_run() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = parse_entries("Locked, https://locked.test").entries;
        let client = FakeClient::new(vec![Err(ScrapeFailure::Auth("invalid key".into()))]);
        let writer = OutputWriter::new(tmp.path());

        let summary = run(&client, &entries, &writer, false).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(summary.outcomes()[0].status, Status::Failure);
        assert_eq!(summary.outcomes()[0].detail, "authentication failed: invalid key");
        assert_eq!(summary.exit_code(), 1);
        assert!(!tmp.path().join("locked.md").exists());
    }

    #[tokio::test]
    async fn write_error_becomes_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();
        let entries = parse_entries("Fine, https://fine.test").entries;
        let client = FakeClient::new(vec![Ok(complete_md())]);
        let writer = OutputWriter::new(blocker.join("out"));

        let summary = run(&client, &entries, &writer, false).await.unwrap();

        assert_eq!(summary.outcomes()[0].status, Status::Failure);
        assert!(summary.outcomes()[0].detail.contains("cannot create output directory"));
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn outcomes_keep_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = parse_entries("C,https://c.test\nA,https://a.test\nB,https://b.test").entries;
        let client = FakeClient::new(vec![
            Ok(complete_md()),
            Err(ScrapeFailure::Unknown("boom".into())),
            Ok(complete_md()),
        ]);
        let writer = OutputWriter::new(tmp.path());

        let summary = run(&client, &entries, &writer, true).await.unwrap();

        let names: Vec<&str> = summary.outcomes().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);
        assert_eq!(summary.count(Status::Failure), 1);
        let urls: Vec<String> = client.calls.borrow().iter().map(|(u, _)| u.clone()).collect();
        assert_eq!(urls, ["https://c.test", "https://a.test", "https://b.test"]);
    }

    #[tokio::test]
    async fn crawl_writes_numbered_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = parse_entries("Docs Site, https://docs.test\nDead, https://dead.test").entries;
        let client = FakeClient::new(vec![]).with_crawls(vec![
            Ok(vec!["# Home".into(), "# Guide".into()]),
            Err(ScrapeFailure::Network("connection refused".into())),
        ]);
        let writer = OutputWriter::new(tmp.path()).with_json(true);

        let summary = run_crawl(&client, &entries, &writer, 7).await.unwrap();

        assert_eq!(client.call_count(), 0);
        assert_eq!(
            *client.crawls.borrow(),
            vec![("https://docs.test".to_string(), 7), ("https://dead.test".to_string(), 7)]
        );
        assert_eq!(summary.count(Status::Success), 1);
        assert_eq!(summary.count(Status::Failure), 1);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(std::fs::read_to_string(tmp.path().join("docs_site_1.md")).unwrap(), "# Home");
        assert_eq!(std::fs::read_to_string(tmp.path().join("docs_site_2.md")).unwrap(), "# Guide");

        let raw = std::fs::read_to_string(tmp.path().join("docs_site_2.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["url"], "https://docs.test/page-2");
    }

    #[tokio::test]
    async fn empty_crawl_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = parse_entries("Nothing, https://nothing.test").entries;
        let client = FakeClient::new(vec![]).with_crawls(vec![Ok(vec![])]);
        let writer = OutputWriter::new(tmp.path());

        let summary = run_crawl(&client, &entries, &writer, 3).await.unwrap();

        assert_eq!(summary.outcomes()[0].status, Status::Failure);
        assert_eq!(summary.outcomes()[0].detail, "crawl returned no pages");
    }
}
