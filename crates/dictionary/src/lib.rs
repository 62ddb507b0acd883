//! Client for the dictionary word-lookup service used to decide whether a
//! word-admission poll can be skipped.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

const BASE_URL: &str = "https://dictionary.yandex.net/api/v1/dicservice.json/lookup";

#[derive(Debug, Clone)]
pub struct DictionaryClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    def: Vec<Definition>,
}

#[derive(Debug, Deserialize)]
struct Definition {
    pos: String,
}

impl DictionaryClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build dictionary http client");
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    /// A word is accepted iff the dictionary returns a definition whose
    /// first part of speech is a noun.
    pub async fn is_noun(&self, word: &str) -> Result<bool> {
        let response = self
            .http
            .get(BASE_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("lang", "ru-ru"),
                ("text", word),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<LookupResponse>()
            .await?;

        Ok(response
            .def
            .first()
            .map(|def| def.pos == "noun")
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_response_with_no_definitions_parses() {
        let parsed: LookupResponse = serde_json::from_str(r#"{"def": []}"#).unwrap();
        assert!(parsed.def.is_empty());
    }

    #[test]
    fn lookup_response_with_noun_parses() {
        let parsed: LookupResponse =
            serde_json::from_str(r#"{"def": [{"pos": "noun"}]}"#).unwrap();
        assert_eq!(parsed.def[0].pos, "noun");
    }
}
