use crate::browser::BrowserSession;
use crate::config::Selectors;
use crate::errors::Result;
use crate::listing;
use crate::types::BrowserConfig;
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Typed per-page outcome. A failed page stays visible in the aggregate
/// instead of silently disappearing.
#[derive(Debug)]
pub struct PageScrape {
    pub page_url: String,
    pub outcome: Result<Vec<String>>,
}

/// Worker count for both fan-outs: available CPUs minus one, floored at one.
pub fn workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Pulls offer hrefs out of rendered listing HTML, dropping the sponsored
/// duplicates the site renders twice (identified by the promo marker
/// substring in the href).
pub fn extract_offer_links(html: &str, selectors: &Selectors) -> Vec<String> {
    let link_selector = match Selector::parse(&selectors.offer_link) {
        Ok(selector) => selector,
        Err(e) => {
            error!("Invalid offer link selector: {e}");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| !href.contains(&selectors.promo_marker))
        .map(str::to_string)
        .collect()
}

/// Scrapes one listing page with its own browser instance. The browser is
/// torn down when the session drops, on success and failure alike.
pub async fn scrape_page(
    config: &BrowserConfig,
    selectors: &Selectors,
    url: &str,
) -> Result<Vec<String>> {
    let session = BrowserSession::launch(config.clone())?;
    session.navigate(url)?;

    match session.click_all(&selectors.reveal_more) {
        Ok(0) => debug!("No reveal-more tiles found on {url}"),
        Ok(n) => debug!("Clicked {n} reveal-more tile(s) on {url}"),
        Err(e) => warn!("Reveal-more click phase failed on {url}: {e}"),
    }

    let html = session.page_source()?;
    let links = extract_offer_links(&html, selectors);
    info!("Scraped {} offer URLs from {url}", links.len());
    Ok(links)
}

/// Fans the per-page scrapes out across a bounded set of workers and
/// collects results in completion order.
pub async fn run_scraper(
    config: &BrowserConfig,
    selectors: &Selectors,
    base_url: &str,
) -> Vec<PageScrape> {
    let urls = listing::generate_all_page_urls(selectors, base_url).await;
    scrape_pages(config, selectors, urls).await
}

pub async fn scrape_pages(
    config: &BrowserConfig,
    selectors: &Selectors,
    urls: Vec<String>,
) -> Vec<PageScrape> {
    let limit = workers();
    debug!("Scraping {} page(s) with {limit} worker(s)", urls.len());

    let config = Arc::new(config.clone());
    let selectors = Arc::new(selectors.clone());
    let mut queue = urls.into_iter();
    let mut tasks: JoinSet<PageScrape> = JoinSet::new();
    let mut results = Vec::new();

    let mut spawn = |tasks: &mut JoinSet<PageScrape>, url: String| {
        let config = Arc::clone(&config);
        let selectors = Arc::clone(&selectors);
        tasks.spawn(async move {
            let outcome = scrape_page(&config, &selectors, &url).await;
            PageScrape {
                page_url: url,
                outcome,
            }
        });
    };

    for url in queue.by_ref().take(limit) {
        spawn(&mut tasks, url);
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                if let Err(e) = &result.outcome {
                    error!("Scrape of {} failed: {e}", result.page_url);
                }
                results.push(result);
            }
            Err(e) => error!("Scrape worker panicked: {e}"),
        }
        if let Some(url) = queue.next() {
            spawn(&mut tasks, url);
        }
    }

    results
}

/// Flattens the successful page scrapes into the offer URL list.
pub fn collect_offer_urls(pages: &[PageScrape]) -> Vec<String> {
    let offers: Vec<String> = pages
        .iter()
        .filter_map(|p| p.outcome.as_ref().ok())
        .flatten()
        .cloned()
        .collect();
    info!("Finished scraping. Total URLs collected: {}", offers.len());
    offers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApplierError;

    const LISTING_HTML: &str = r#"
        <html><body>
            <a data-test="link-offer" href="https://www.pracuj.pl/praca/dev-1">Dev</a>
            <a data-test="link-offer" href="https://www.pracuj.pl/praca/dev-1?boosterAI=1">Dev</a>
            <a data-test="link-offer" href="https://www.pracuj.pl/praca/dev-2">Dev 2</a>
            <a href="https://www.pracuj.pl/other">unrelated</a>
            <a data-test="link-offer" href="https://it.pracuj.pl/boosterAI/dev-3">Dev 3</a>
        </body></html>
    "#;

    #[test]
    fn promotional_links_are_excluded_wherever_they_appear() {
        let links = extract_offer_links(LISTING_HTML, &Selectors::default());
        assert_eq!(
            links,
            vec![
                "https://www.pracuj.pl/praca/dev-1",
                "https://www.pracuj.pl/praca/dev-2",
            ]
        );
    }

    #[test]
    fn only_offer_links_are_considered() {
        let html = r#"<a href="https://www.pracuj.pl/praca/dev-9">no data-test</a>"#;
        assert!(extract_offer_links(html, &Selectors::default()).is_empty());
    }

    #[test]
    fn workers_is_at_least_one() {
        assert!(workers() >= 1);
    }

    #[test]
    fn failed_pages_stay_visible_but_do_not_contribute_offers() {
        let pages = vec![
            PageScrape {
                page_url: "p1".to_string(),
                outcome: Ok(vec!["o1".to_string(), "o2".to_string()]),
            },
            PageScrape {
                page_url: "p2".to_string(),
                outcome: Err(ApplierError::NavigationFailed("boom".to_string())),
            },
            PageScrape {
                page_url: "p3".to_string(),
                outcome: Ok(vec!["o3".to_string()]),
            },
        ];
        let offers = collect_offer_urls(&pages);
        assert_eq!(offers, vec!["o1", "o2", "o3"]);
        assert_eq!(pages.iter().filter(|p| p.outcome.is_err()).count(), 1);
    }
}
