use crate::browser::random_user_agent;
use crate::config::Selectors;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// HTTP client for the single pagination probe, with a randomized user
/// agent like the browser sessions use.
pub fn probe_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(random_user_agent())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Fetches the first listing page and parses the max page marker. Any
/// request or parse problem, or a missing marker, falls back to one page.
pub async fn max_page_number(client: &reqwest::Client, selectors: &Selectors, url: &str) -> u32 {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            error!("Listing URL has unsupported scheme '{}': {url}", parsed.scheme());
            return 1;
        }
        Err(e) => {
            error!("Invalid listing URL {url}: {e}");
            return 1;
        }
    }

    let body = match client.get(url).send().await {
        Ok(response) => match response.error_for_status() {
            Ok(ok) => match ok.text().await {
                Ok(body) => body,
                Err(e) => {
                    error!("Failed to read listing body for {url}: {e}");
                    return 1;
                }
            },
            Err(e) => {
                error!("Request error for {url}: {e}");
                return 1;
            }
        },
        Err(e) => {
            error!("Request error for {url}: {e}");
            return 1;
        }
    };

    parse_max_page(&body, selectors)
}

pub fn parse_max_page(html: &str, selectors: &Selectors) -> u32 {
    let marker = match Selector::parse(&selectors.pagination_max_page) {
        Ok(marker) => marker,
        Err(e) => {
            error!("Invalid pagination selector: {e}");
            return 1;
        }
    };

    let document = Html::parse_document(html);
    match document
        .select(&marker)
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
    {
        Some(max_page) => {
            debug!("Max page number found: {max_page}");
            max_page
        }
        None => {
            debug!("No explicit max page number element found. Assuming 1 page.");
            1
        }
    }
}

/// Page 1 is the base URL itself; later pages append the `pn` query
/// parameter, branching on whether the base already carries a query.
pub fn build_page_urls(base_url: &str, pages: u32) -> Vec<String> {
    let mut urls = vec![base_url.to_string()];
    for page in 2..=pages {
        if base_url.contains('?') {
            urls.push(format!("{base_url}&pn={page}"));
        } else {
            urls.push(format!("{base_url}?pn={page}"));
        }
    }
    urls
}

/// All listing page URLs to scrape for a base search URL.
pub async fn generate_all_page_urls(selectors: &Selectors, base_url: &str) -> Vec<String> {
    let client = probe_client();
    let pages = max_page_number(&client, selectors, base_url).await;
    let urls = build_page_urls(base_url, pages);
    debug!("Generated {} URLs for scraping", urls.len());
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn marked_page(n: u32) -> String {
        format!(
            r#"<html><body>
                <span data-test="top-pagination-max-page-number">{n}</span>
            </body></html>"#
        )
    }

    #[test]
    fn no_marker_means_single_page() {
        let pages = parse_max_page("<html><body>no pagination</body></html>", &Selectors::default());
        assert_eq!(pages, 1);
        assert_eq!(
            build_page_urls("https://www.pracuj.pl/praca", pages),
            vec!["https://www.pracuj.pl/praca"]
        );
    }

    #[test]
    fn non_numeric_marker_means_single_page() {
        let html = r#"<span data-test="top-pagination-max-page-number">many</span>"#;
        assert_eq!(parse_max_page(html, &Selectors::default()), 1);
    }

    #[test]
    fn marker_value_drives_page_count() {
        assert_eq!(parse_max_page(&marked_page(7), &Selectors::default()), 7);
    }

    #[test]
    fn plain_base_url_gets_question_mark_pages() {
        let urls = build_page_urls("https://www.pracuj.pl/praca/rust;kw", 3);
        assert_eq!(
            urls,
            vec![
                "https://www.pracuj.pl/praca/rust;kw",
                "https://www.pracuj.pl/praca/rust;kw?pn=2",
                "https://www.pracuj.pl/praca/rust;kw?pn=3",
            ]
        );
    }

    #[test]
    fn query_base_url_gets_ampersand_pages() {
        let urls = build_page_urls("https://www.pracuj.pl/praca?its=it", 3);
        assert_eq!(
            urls,
            vec![
                "https://www.pracuj.pl/praca?its=it",
                "https://www.pracuj.pl/praca?its=it&pn=2",
                "https://www.pracuj.pl/praca?its=it&pn=3",
            ]
        );
    }

    #[tokio::test]
    async fn probe_reads_marker_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/praca"))
            .respond_with(ResponseTemplate::new(200).set_body_string(marked_page(3)))
            .mount(&server)
            .await;

        let url = format!("{}/praca", server.uri());
        let pages = max_page_number(&probe_client(), &Selectors::default(), &url).await;
        assert_eq!(pages, 3);
        assert_eq!(build_page_urls(&url, pages).len(), 3);
    }

    #[tokio::test]
    async fn malformed_listing_url_defaults_to_one_page() {
        let pages = max_page_number(&probe_client(), &Selectors::default(), "not a url").await;
        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn probe_failure_defaults_to_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/praca"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = format!("{}/praca", server.uri());
        assert_eq!(
            max_page_number(&probe_client(), &Selectors::default(), &url).await,
            1
        );
    }
}
