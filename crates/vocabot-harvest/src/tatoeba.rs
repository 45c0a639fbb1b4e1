//! Tatoeba sentence search client.
//!
//! Uses the public `api_v0/search` endpoint (no API key required). Only the
//! first result is used: its text becomes the example sentence and the first
//! translation of its first translation group becomes the example translation.

use std::time::Duration;

use async_trait::async_trait;
use vocabot_core::config::EnrichConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::SentenceSource;
use vocabot_core::types::{EMPTY_TRANSLATION_MARKER, ExamplePair};

pub struct TatoebaClient {
    base_url: String,
    from_lang: String,
    to_lang: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl TatoebaClient {
    pub fn new(config: &EnrichConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            from_lang: config.from_lang.clone(),
            to_lang: config.to_lang.clone(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl SentenceSource for TatoebaClient {
    fn name(&self) -> &str {
        "tatoeba"
    }

    async fn lookup(&self, word: &str) -> Result<Option<ExamplePair>> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("from", self.from_lang.as_str()),
                ("query", word),
                ("to", self.to_lang.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| VocabotError::Http(format!("Tatoeba request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VocabotError::Lookup(format!("Tatoeba returned {status} for '{word}'")));
        }

        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(data) => Ok(parse_search_response(&data)),
            Err(e) => {
                tracing::warn!("⚠️ Unreadable Tatoeba response for '{word}': {e}");
                Ok(None)
            }
        }
    }
}

/// Extract the example pair from a search response.
/// `None` when there are no results or the first one has no text.
pub fn parse_search_response(data: &serde_json::Value) -> Option<ExamplePair> {
    let first = data.get("results")?.as_array()?.first()?;
    let sentence = first.get("text")?.as_str()?.trim();
    if sentence.is_empty() {
        return None;
    }

    let translation = first
        .get("translations")
        .and_then(|t| t.as_array())
        .and_then(|groups| groups.first())
        .and_then(|group| group.as_array())
        .and_then(|group| group.first())
        .and_then(|t| t.get("text"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(EMPTY_TRANSLATION_MARKER);

    Some(ExamplePair {
        sentence: sentence.to_string(),
        translation: translation.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_pair() {
        let data = json!({
            "paging": {},
            "results": [{
                "id": 1,
                "text": "  Profits rose sharply this year. ",
                "translations": [
                    [{"id": 2, "text": "今年利润大幅上升。", "lang": "cmn"}],
                    []
                ]
            }, {
                "text": "ignored"
            }]
        });
        let pair = parse_search_response(&data).unwrap();
        assert_eq!(pair.sentence, "Profits rose sharply this year.");
        assert_eq!(pair.translation, "今年利润大幅上升。");
        assert!(pair.has_translation());
    }

    #[test]
    fn test_missing_translation_uses_marker() {
        for translations in [json!([]), json!([[]]), json!([[{"text": "  "}]]), json!(null)] {
            let data = json!({
                "results": [{"text": "We audit every quarter.", "translations": translations}]
            });
            let pair = parse_search_response(&data).unwrap();
            assert_eq!(pair.sentence, "We audit every quarter.");
            assert_eq!(pair.translation, EMPTY_TRANSLATION_MARKER);
            assert!(!pair.has_translation());
        }
    }

    #[test]
    fn test_no_results() {
        assert_eq!(parse_search_response(&json!({"results": []})), None);
        assert_eq!(parse_search_response(&json!({})), None);
        assert_eq!(parse_search_response(&json!({"results": "oops"})), None);
        assert_eq!(parse_search_response(&json!({"results": [{"text": "   "}]})), None);
        assert_eq!(parse_search_response(&json!({"results": [{"id": 3}]})), None);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let config = EnrichConfig {
            base_url: "http://127.0.0.1:9/api_v0/search".into(),
            timeout_secs: 1,
            ..EnrichConfig::default()
        };
        let err = TatoebaClient::new(&config).lookup("yield").await.unwrap_err();
        assert!(err.is_soft());
    }
}
