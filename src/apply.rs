use crate::agent::FormAgent;
use crate::browser::BrowserSession;
use crate::config::{DataPaths, SessionConfig, Selectors};
use crate::errors::Result;
use crate::scrape;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// An offer whose apply flow redirected off-site; the captured URL points
/// at the external application form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalApplication {
    pub url: String,
}

/// AI dispatch only happens when it is both enabled and has work to do.
pub fn should_dispatch(apply_with_ai: bool, records: &[ExternalApplication]) -> bool {
    apply_with_ai && !records.is_empty()
}

/// Walks the scraped offers in the logged-in session, clicking whichever
/// apply path each one exposes and collecting the off-site redirects.
pub struct ApplyOrchestrator<'a> {
    session: &'a BrowserSession,
    config: &'a SessionConfig,
    selectors: &'a Selectors,
    paths: &'a DataPaths,
}

impl<'a> ApplyOrchestrator<'a> {
    pub fn new(
        session: &'a BrowserSession,
        config: &'a SessionConfig,
        selectors: &'a Selectors,
        paths: &'a DataPaths,
    ) -> Self {
        Self {
            session,
            config,
            selectors,
            paths,
        }
    }

    /// Applies to every offer and, when enabled, hands the external forms
    /// to the agent fan-out.
    pub async fn apply(&self, offer_urls: &[String]) -> Result<Vec<ExternalApplication>> {
        let records = self.collect_external_applications(offer_urls).await;

        if should_dispatch(self.config.apply_with_ai, &records) {
            info!("Found {} external job applications", records.len());
            dispatch_agents(self.config, self.paths, &records).await?;
        } else {
            info!("No external job applications to process, or AI apply is disabled");
        }

        Ok(records)
    }

    pub async fn collect_external_applications(
        &self,
        offer_urls: &[String],
    ) -> Vec<ExternalApplication> {
        let mut records = Vec::new();
        for url in offer_urls {
            match self.find_and_click_apply(url).await {
                Some(external_url) => {
                    info!("Found external application URL: {external_url}");
                    records.push(ExternalApplication { url: external_url });
                }
                None => debug!("Offer handled in-site or not applicable: {url}"),
            }
        }
        records
    }

    /// Tries the fast-apply path first; otherwise the normal-apply path that
    /// may open an external tab. Returns the external URL when one appears.
    async fn find_and_click_apply(&self, offer_url: &str) -> Option<String> {
        if let Err(e) = self.session.navigate(offer_url) {
            warn!("Could not open offer {offer_url}: {e}");
            return None;
        }

        if self.try_click(&self.selectors.fast_apply) {
            info!("Clicked fast apply button");
            return None;
        }

        if !self.try_click(&self.selectors.normal_apply) {
            warn!("No apply buttons were found or could be clicked");
            return None;
        }
        info!("Clicked normal apply button, looking for continue button");

        if !self.try_click(&self.selectors.apply_continue) {
            warn!("No apply buttons were found or could be clicked");
            return None;
        }
        info!("Clicked continue button");

        match self.session.wait_for_external_tab().await {
            Ok(tab) => {
                let external_url = tab.get_url();
                info!("Switched to new tab with URL: {external_url}");
                if let Err(e) = self.session.close_tab_and_refocus(&tab) {
                    warn!("Could not close external tab: {e}");
                }
                Some(external_url)
            }
            Err(_) => {
                warn!("No new window opened after clicking continue or URL did not change");
                None
            }
        }
    }

    /// A click that times out means "this offer doesn't have that button",
    /// which is an expected state, not an error.
    fn try_click(&self, selector: &str) -> bool {
        match self.session.click(selector) {
            Ok(()) => true,
            Err(e) => {
                debug!("Button with selector {selector} not found or not clickable: {e}");
                false
            }
        }
    }
}

/// One agent worker per external application, bounded by the shared worker
/// sizing. A failing worker is logged and never disturbs its siblings.
pub async fn dispatch_agents(
    config: &SessionConfig,
    paths: &DataPaths,
    records: &[ExternalApplication],
) -> Result<()> {
    // Build once to fail fast on broken LLM settings before spawning
    // anything; workers construct their own agent from the same config.
    FormAgent::new(config, paths)?;

    let limit = scrape::workers();
    debug!(
        "Dispatching {} application(s) across {limit} worker(s)",
        records.len()
    );

    let config = Arc::new(config.clone());
    let paths = Arc::new(paths.clone());
    let mut queue = records.iter().map(|r| r.url.clone());
    let mut tasks: JoinSet<()> = JoinSet::new();

    let mut spawn = |tasks: &mut JoinSet<()>, url: String| {
        let config = Arc::clone(&config);
        let paths = Arc::clone(&paths);
        tasks.spawn(async move {
            info!("Starting job application for URL: {url}");
            let agent = match FormAgent::new(&config, &paths) {
                Ok(agent) => agent,
                Err(e) => {
                    warn!("Could not build agent for {url}: {e}");
                    return;
                }
            };
            match agent.run(&url).await {
                Ok(()) => info!("Successfully finished application for URL: {url}"),
                Err(e) => warn!("An error occurred while applying for {url}: {e}"),
            }
        });
    };

    for url in queue.by_ref().take(limit) {
        spawn(&mut tasks, url);
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Application worker panicked: {e}");
        }
        if let Some(url) = queue.next() {
            spawn(&mut tasks, url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selectors;
    use crate::listing::{build_page_urls, parse_max_page};
    use crate::scrape::extract_offer_links;

    fn records(n: usize) -> Vec<ExternalApplication> {
        (0..n)
            .map(|i| ExternalApplication {
                url: format!("https://forms.example.com/{i}"),
            })
            .collect()
    }

    #[test]
    fn dispatch_is_skipped_with_zero_records() {
        assert!(!should_dispatch(true, &records(0)));
    }

    #[test]
    fn dispatch_is_skipped_when_ai_apply_disabled() {
        assert!(!should_dispatch(false, &records(3)));
    }

    #[test]
    fn dispatch_runs_when_enabled_with_records() {
        assert!(should_dispatch(true, &records(1)));
    }

    // Pagination marker through dedup to agent dispatch, composed the way
    // the run composes them.
    #[test]
    fn marker_page_count_and_promo_dedup_feed_a_single_dispatch() {
        let selectors = Selectors::default();
        let listing_page = r#"<html><body>
            <span data-test="top-pagination-max-page-number">3</span>
            <a data-test="link-offer" href="https://www.pracuj.pl/praca/dev-1">Dev</a>
            <a data-test="link-offer" href="https://www.pracuj.pl/praca/dev-1?boosterAI=1">Dev</a>
        </body></html>"#;

        let pages = parse_max_page(listing_page, &selectors);
        assert_eq!(pages, 3);
        let urls = build_page_urls("https://www.pracuj.pl/praca/rust;kw", pages);
        assert_eq!(urls.len(), 3);
        assert!(urls[1].ends_with("?pn=2"));
        assert!(urls[2].ends_with("?pn=3"));

        let offers = extract_offer_links(listing_page, &selectors);
        assert_eq!(offers, vec!["https://www.pracuj.pl/praca/dev-1"]);

        // The surviving offer's normal-apply path opened an external tab.
        let external: Vec<ExternalApplication> = offers
            .iter()
            .map(|_| ExternalApplication {
                url: "https://forms.example.com/apply".to_string(),
            })
            .collect();
        assert_eq!(external.len(), 1);
        assert!(should_dispatch(true, &external));
        assert_eq!(scrape::workers().min(external.len()), 1);
    }
}
