//! Word list scraper.
//!
//! The index page links one page per letter group. Each page holds the words
//! inside a single content element, one `term pos. translation` per line.
//! HTML parsing is kept in sync functions so no parsed document lives across
//! an await point.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use vocabot_core::config::ScrapeConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::VocabStore;
use vocabot_core::types::NewWord;

static WORD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+([a-zA-Z.]+)\.\s+(.*)$").expect("static regex"));
static LETTER_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z-]+$").expect("static regex"));
static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

const AD_MARKERS: [&str; 2] = ["更多请点击", "新东方在线"];

/// What one scrape run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub pages: usize,
    pub failed_pages: usize,
    pub parsed: usize,
    pub inserted: usize,
}

pub struct WordListScraper {
    config: ScrapeConfig,
    client: reqwest::Client,
}

impl WordListScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VocabotError::Http(format!("HTTP client: {e}")))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn fetch(&self, url: &str, referer: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, referer)
            .send()
            .await
            .map_err(|e| VocabotError::Http(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VocabotError::Http(format!("GET {url}: {status}")));
        }
        resp.text()
            .await
            .map_err(|e| VocabotError::Http(format!("GET {url}: {e}")))
    }

    /// `(label, absolute url)` for every word-list page on the index.
    pub async fn letter_links(&self) -> Result<Vec<(String, String)>> {
        let index_url = &self.config.index_url;
        let base = Url::parse(index_url)
            .map_err(|e| VocabotError::Config(format!("index_url '{index_url}': {e}")))?;
        let referer = format!("{}/", base.origin().ascii_serialization());
        let html = self.fetch(&self.config.index_url, &referer).await?;
        let links = extract_links(&html, &base, &self.config.link_marker);
        tracing::info!("🔗 Found {} word list pages", links.len());
        Ok(links)
    }

    /// Words parsed from one page.
    pub async fn fetch_page(&self, url: &str) -> Result<Vec<NewWord>> {
        let html = self.fetch(url, &self.config.index_url).await?;
        let lines = extract_content_lines(&html, &self.config.content_class)?.ok_or_else(|| {
            VocabotError::Other(format!(
                "no '{}' content on {url}",
                self.config.content_class
            ))
        })?;
        Ok(parse_word_lines(&lines))
    }

    /// Scrape every page and insert new words. A failing page is logged and skipped.
    pub async fn run<S: VocabStore>(&self, store: &S) -> Result<ScrapeReport> {
        let links = self.letter_links().await?;
        let mut report = ScrapeReport::default();
        let delay = Duration::from_millis(self.config.delay_ms);

        for (label, url) in &links {
            tokio::time::sleep(delay).await;
            report.pages += 1;
            tracing::info!("📥 {label} {url}");

            let words = match self.fetch_page(url).await {
                Ok(words) => words,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {url}: {e}");
                    report.failed_pages += 1;
                    continue;
                }
            };
            report.parsed += words.len();
            if words.is_empty() {
                continue;
            }
            tracing::debug!("First words: {:?}", &words[..words.len().min(3)]);

            match store.insert_if_absent(&words) {
                Ok(n) => {
                    tracing::info!("💾 {} words parsed, {n} new", words.len());
                    report.inserted += n;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Saving words from {url} failed: {e}");
                    report.failed_pages += 1;
                }
            }
        }

        tracing::info!(
            "📊 Scraped {} pages ({} failed), {} words parsed, {} inserted",
            report.pages,
            report.failed_pages,
            report.parsed,
            report.inserted
        );
        Ok(report)
    }
}

/// Anchors whose text contains `marker`, with hrefs resolved against `base`.
pub fn extract_links(html: &str, base: &Url, marker: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| {
            let text = a.text().collect::<String>();
            if !text.contains(marker) {
                return None;
            }
            let href = a.value().attr("href")?;
            let url = base.join(href).ok()?;
            Some((text.trim().to_string(), url.to_string()))
        })
        .collect()
}

/// Non-empty text lines of the first `div.<class>` element, `None` if the page has none.
/// `class` must be a single plain class name.
pub fn extract_content_lines(html: &str, class: &str) -> Result<Option<Vec<String>>> {
    if !CLASS_NAME.is_match(class) {
        return Err(VocabotError::Config(format!(
            "content class '{class}' is not a plain class name"
        )));
    }
    // Display on selector errors can panic for some tokens, so only Debug is used.
    let selector = Selector::parse(&format!("div.{class}"))
        .map_err(|e| VocabotError::Config(format!("content class '{class}': {e:?}")))?;
    let document = Html::parse_document(html);
    let Some(content) = document.select(&selector).next() else {
        return Ok(None);
    };

    let lines = content
        .text()
        .flat_map(|node| node.split('\n'))
        .map(|line| line.replace('\u{3000}', " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    Ok(Some(lines))
}

/// Parse `term pos. translation` lines, skipping letter headings and ads.
pub fn parse_word_lines(lines: &[String]) -> Vec<NewWord> {
    lines
        .iter()
        .filter(|line| !LETTER_HEADING.is_match(line))
        .filter(|line| !AD_MARKERS.iter().any(|ad| line.contains(ad)))
        .filter_map(|line| {
            let caps = WORD_LINE.captures(line)?;
            Some(NewWord {
                term: caps[1].trim().to_string(),
                part_of_speech: Some(caps[2].trim().to_string()),
                translation: caps[3].trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <html><body>
          <a href="/20170619/821130.html">BEC商务英语初级必备词汇：A</a>
          <a href="https://english.koolearn.com/20170619/821131.html">BEC商务英语初级必备词汇：Y-Z</a>
          <a href="/about.html">关于我们</a>
          <a>BEC商务英语初级必备词汇：no href</a>
        </body></html>
    "#;

    const PAGE: &str = "
        <html><body>
          <div class=\"nav\">yield n. not this one</div>
          <div class=\"xqy_core_text\">
            <p>Y-Z</p>
            <p>yield n.&nbsp; 有效产量</p>
            <p>\u{3000}abroad adv. 在国外，出国<br>zero num. 零</p>
            <p>更多请点击 新东方在线</p>
            <p>BEC初级词汇</p>
          </div>
        </body></html>
    ";

    #[test]
    fn test_extract_links() {
        let base = Url::parse("https://english.koolearn.com/20170619/821129.html").unwrap();
        let links = extract_links(INDEX, &base, "BEC商务英语初级必备词汇：");
        assert_eq!(
            links,
            vec![
                (
                    "BEC商务英语初级必备词汇：A".to_string(),
                    "https://english.koolearn.com/20170619/821130.html".to_string()
                ),
                (
                    "BEC商务英语初级必备词汇：Y-Z".to_string(),
                    "https://english.koolearn.com/20170619/821131.html".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_extract_content_lines() {
        let lines = extract_content_lines(PAGE, "xqy_core_text").unwrap().unwrap();
        assert_eq!(lines[0], "Y-Z");
        assert_eq!(lines[2], "abroad adv. 在国外，出国");
        assert_eq!(lines[3], "zero num. 零");
        assert!(lines.iter().all(|l| !l.contains("not this one")));
        assert_eq!(extract_content_lines(PAGE, "art-content").unwrap(), None);
    }

    #[test]
    fn test_parse_page() {
        let lines = extract_content_lines(PAGE, "xqy_core_text").unwrap().unwrap();
        let words = parse_word_lines(&lines);
        let parsed: Vec<_> = words
            .iter()
            .map(|w| (w.term.as_str(), w.part_of_speech.as_deref(), w.translation.as_str()))
            .collect();
        assert_eq!(
            parsed,
            vec![
                ("yield", Some("n"), "有效产量"),
                ("abroad", Some("adv"), "在国外，出国"),
                ("zero", Some("num"), "零"),
            ]
        );
    }

    #[test]
    fn test_skips_headings_and_ads() {
        let lines: Vec<String> = [
            "A",
            "Y-Z",
            "更多请点击 asset n. 资产",
            "Welcome to the list",
            "asset n. 资产",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let words = parse_word_lines(&lines);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].term, "asset");
    }

    #[test]
    fn test_bad_content_class() {
        for class in ["bad class!", "x!", "", "a.b", "div > p", "#id"] {
            let err = extract_content_lines(PAGE, class).unwrap_err();
            assert!(matches!(err, VocabotError::Config(_)), "{class}: {err:?}");
        }
        assert!(extract_content_lines(PAGE, "xqy_core_text").unwrap().is_some());
        assert_eq!(extract_content_lines(PAGE, "art-content").unwrap(), None);
    }
}
