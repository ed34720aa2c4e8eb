//! HTTP scraper - reqwest + scraper で公開ページを可視テキストにする
//!
//! - browser-like headers, redirect limit 5
//! - script / style / nav / footer などは捨てる
//! - `max_content_chars` 文字で切る
//! - JavaScript は実行しない（静的 HTML のみ）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{Html, Node};
use tracing::debug;

use crate::config::ScraperSettings;
use crate::domain::{Stage, StageError};
use crate::ports::{Scraper, StageContext};

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "nav", "footer", "head",
];

pub struct HttpScraper {
    client: reqwest::Client,
    timeout: Duration,
    max_content_chars: usize,
}

impl HttpScraper {
    pub fn new(settings: &ScraperSettings, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            timeout,
            max_content_chars: settings.max_content_chars,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, StageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::upstream(
                Stage::Scrape,
                format!("HTTP {status} for {url}"),
            ));
        }

        response.text().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> StageError {
        if err.is_timeout() {
            StageError::Timeout {
                stage: Stage::Scrape,
                after: self.timeout,
            }
        } else {
            StageError::upstream(Stage::Scrape, err.to_string())
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, ctx: &StageContext, url: &str) -> Result<String, StageError> {
        let url = normalize_url(url);
        let html = tokio::time::timeout(self.timeout, self.fetch(&url))
            .await
            .map_err(|_| StageError::Timeout {
                stage: Stage::Scrape,
                after: self.timeout,
            })??;

        let text = truncate_chars(&visible_text(&html), self.max_content_chars);
        if text.is_empty() {
            return Err(StageError::invalid_response(
                Stage::Scrape,
                format!("no visible text at {url}"),
            ));
        }
        debug!(lead_id = %ctx.lead_id, %url, chars = text.chars().count(), "page scraped");
        Ok(text)
    }
}

/// Lead websites are often stored without a scheme.
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Visible text of an HTML document, one text run per line.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;
    use httpmock::prelude::*;

    const PAGE: &str = r#"
        <html>
          <head><title>Acme</title><style>body { color: red }</style></head>
          <body>
            <nav>Home | About</nav>
            <h1>Acme Indústria</h1>
            <p>Fale conosco: contato@acme.test</p>
            <script>trackVisitor()</script>
            <footer>© 2025</footer>
          </body>
        </html>"#;

    fn scraper(timeout: Duration, max_chars: usize) -> HttpScraper {
        let settings = ScraperSettings {
            max_content_chars: max_chars,
            ..ScraperSettings::default()
        };
        HttpScraper::new(&settings, timeout).unwrap()
    }

    #[test]
    fn strips_boilerplate_elements() {
        let text = visible_text(PAGE);
        assert_eq!(text, "Acme Indústria\nFale conosco: contato@acme.test");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("Indústria", 4), "Indú");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn adds_missing_scheme() {
        assert_eq!(normalize_url(" acme.com.br "), "https://acme.com.br");
        assert_eq!(normalize_url("http://acme.test"), "http://acme.test");
    }

    #[tokio::test]
    async fn scrapes_visible_text_from_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body(PAGE);
            })
            .await;

        let text = scraper(Duration::from_secs(5), 20_000)
            .scrape(&context("t1", "l1"), &server.url("/"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(text.contains("contato@acme.test"));
        assert!(!text.contains("trackVisitor"));
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let err = scraper(Duration::from_secs(5), 20_000)
            .scrape(&context("t1", "l1"), &server.url("/missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Upstream { stage: Stage::Scrape, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).body(PAGE).delay(Duration::from_secs(3));
            })
            .await;

        let err = scraper(Duration::from_millis(200), 20_000)
            .scrape(&context("t1", "l1"), &server.url("/slow"))
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Timeout { stage: Stage::Scrape, .. }));
    }
}
