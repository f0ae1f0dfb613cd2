use tracing::debug;

use crate::completeness::is_complete;
use crate::error::ScrapeFailure;
use crate::input::UrlEntry;
use crate::scraper::{ScrapeClient, ScrapeOptions, ScrapedPage};

/// Hard ceiling on scrape calls per entry.
pub const MAX_ATTEMPTS: u8 = 2;

/// Terminal state of one entry after at most `MAX_ATTEMPTS` scrapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// First attempt succeeded (complete, or already enhanced).
    Complete(ScrapedPage),
    /// First attempt looked incomplete; the enhanced second attempt succeeded.
    /// Kept even when the second page still looks incomplete.
    Retried(ScrapedPage),
    Failed(ScrapeFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub resolution: Resolution,
    pub attempts: u8,
    /// Whether the page that was kept was fetched with enhanced actions.
    pub enhanced: bool,
}

/// Scrape one entry, retrying once with enhanced options if the first
/// result looks incomplete. Transport and service failures are never retried.
pub async fn resolve_entry<C: ScrapeClient>(
    client: &C,
    entry: &UrlEntry,
    force_enhanced: bool,
) -> Resolved {
    let first_options = if force_enhanced {
        ScrapeOptions::ENHANCED
    } else {
        ScrapeOptions::BASIC
    };

    let mut attempts = 1;
    let page = match client.scrape(&entry.url, &first_options).await {
        Ok(page) => page,
        Err(failure) => {
            return Resolved {
                resolution: Resolution::Failed(failure),
                attempts,
                enhanced: force_enhanced,
            };
        }
    };

    if force_enhanced || is_complete(Some(&page.markdown)) {
        return Resolved {
            resolution: Resolution::Complete(page),
            attempts,
            enhanced: force_enhanced,
        };
    }

    debug!(
        "{}: content looks incomplete ({} chars), retrying with scroll/wait actions (attempt 2/{})",
        entry.name,
        page.markdown.trim().chars().count(),
        MAX_ATTEMPTS
    );
    attempts += 1;
    let resolution = match client.scrape(&entry.url, &ScrapeOptions::ENHANCED).await {
        Ok(retried) => {
            if !is_complete(Some(&retried.markdown)) {
                debug!("{}: still incomplete after enhanced scrape, keeping it", entry.name);
            }
            Resolution::Retried(retried)
        }
        Err(failure) => Resolution::Failed(failure),
    };

    Resolved {
        resolution,
        attempts,
        enhanced: true,
    }
}
