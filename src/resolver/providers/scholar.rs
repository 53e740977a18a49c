use super::{surname_first, Query, SearchProvider};
use crate::model::{CitationKind, CitationMetadata};
use crate::resolver::error::ProviderError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

const API_URL: &str = "https://serpapi.com/search.json";

/// Google Scholar via the SerpAPI proxy. Wide net, weak metadata: results
/// rarely carry a DOI, so they take a small confidence penalty.
pub struct GoogleScholar {
    client: Client,
    api_key: String,
    year_pattern: Regex,
}

impl GoogleScholar {
    pub fn new(client: Client, api_key: String) -> Self {
        GoogleScholar {
            client,
            api_key,
            year_pattern: Regex::new(r"\b(1[6-9]\d{2}|20\d{2})\b").expect("year pattern is valid"),
        }
    }

    /// Constructed only when SERPAPI_KEY is present.
    pub fn from_env(client: Client) -> Option<Self> {
        dotenvy::dotenv().ok();
        std::env::var("SERPAPI_KEY")
            .ok()
            .map(|key| Self::new(client, key))
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    publication_info: Option<PublicationInfo>,
}

#[derive(Deserialize)]
struct PublicationInfo {
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<ScholarAuthor>,
}

#[derive(Deserialize)]
struct ScholarAuthor {
    name: Option<String>,
}

impl GoogleScholar {
    fn into_metadata(&self, result: OrganicResult) -> CitationMetadata {
        let summary = result
            .publication_info
            .as_ref()
            .and_then(|info| info.summary.clone())
            .unwrap_or_default();

        // Summaries look like "A Bandura - Psychological review, 1977 - ...".
        let mut authors: Vec<String> = result
            .publication_info
            .map(|info| {
                info.authors
                    .into_iter()
                    .filter_map(|a| a.name)
                    .map(|name| surname_first(&name))
                    .collect()
            })
            .unwrap_or_default();
        if authors.is_empty() {
            if let Some(prefix) = summary.split(" - ").next() {
                authors = prefix
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(surname_first)
                    .collect();
            }
        }

        let year = self
            .year_pattern
            .find(&summary)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let container = summary
            .split(" - ")
            .nth(1)
            .map(|venue| {
                venue
                    .rsplit_once(',')
                    .map(|(name, _)| name.trim().to_string())
                    .unwrap_or_else(|| venue.trim().to_string())
            })
            .unwrap_or_default();

        CitationMetadata {
            kind: CitationKind::Generic,
            title: result.title.unwrap_or_default(),
            authors,
            year,
            container,
            url: result.link.unwrap_or_default(),
            source_engine: "Google Scholar".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleScholar {
    fn name(&self) -> &'static str {
        "Google Scholar"
    }

    async fn search(&self, query: &Query) -> Result<Option<CitationMetadata>, ProviderError> {
        let text = if query.author.is_empty() {
            query.raw.clone()
        } else {
            let mut text = format!("author:{}", query.author);
            if let Some(second) = &query.second_author {
                text.push_str(&format!(" author:{}", second));
            }
            text.push(' ');
            text.push_str(&query.year);
            text
        };

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("engine", "google_scholar"),
                ("q", text.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .organic_results
            .into_iter()
            .next()
            .map(|result| self.into_metadata(result))
            .filter(|meta| !meta.title.is_empty()))
    }

    fn confidence_adjustment(&self, meta: &CitationMetadata) -> f32 {
        // Web-index results without a DOI are the least reliable matches.
        if meta.doi.is_empty() {
            -0.05
        } else {
            0.0
        }
    }
}
