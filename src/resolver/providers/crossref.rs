use super::{Query, SearchProvider};
use crate::model::{CitationKind, CitationMetadata};
use crate::resolver::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const API_URL: &str = "https://api.crossref.org/works";

/// Crossref REST API. Comprehensive coverage and the authoritative source
/// for DOIs.
pub struct Crossref {
    client: Client,
}

impl Crossref {
    pub fn new(client: Client) -> Self {
        Crossref { client }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<Contributor>,
    issued: Option<DateParts>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    issue: String,
    #[serde(default)]
    page: String,
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "type", default)]
    work_type: String,
}

#[derive(Deserialize)]
struct Contributor {
    family: Option<String>,
    given: Option<String>,
}

#[derive(Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i64>>,
}

impl Work {
    fn into_metadata(self) -> CitationMetadata {
        let kind = match self.work_type.as_str() {
            "journal-article" => CitationKind::Journal,
            "book" | "monograph" | "edited-book" | "book-chapter" => CitationKind::Book,
            _ => CitationKind::Generic,
        };
        let year = self
            .issued
            .as_ref()
            .and_then(|d| d.date_parts.first())
            .and_then(|parts| parts.first())
            .map(|y| y.to_string())
            .unwrap_or_default();
        let authors = self
            .author
            .into_iter()
            .filter_map(|c| match (c.family, c.given) {
                (Some(family), Some(given)) => Some(format!("{}, {}", family, given)),
                (Some(family), None) => Some(family),
                _ => None,
            })
            .collect();
        let container = self
            .container_title
            .into_iter()
            .next()
            .unwrap_or(self.publisher);

        CitationMetadata {
            kind,
            title: self.title.into_iter().next().unwrap_or_default(),
            authors,
            year,
            container,
            volume: self.volume,
            issue: self.issue,
            pages: self.page,
            doi: self.doi,
            url: self.url,
            source_engine: "Crossref".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for Crossref {
    fn name(&self) -> &'static str {
        "Crossref"
    }

    async fn search(&self, query: &Query) -> Result<Option<CitationMetadata>, ProviderError> {
        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("query.bibliographic", query.concatenated().as_str()),
                ("rows", "3"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .message
            .items
            .into_iter()
            .next()
            .map(Work::into_metadata)
            .filter(|meta| !meta.title.is_empty()))
    }

    fn verifies_year(&self) -> bool {
        true
    }

    fn confidence_adjustment(&self, meta: &CitationMetadata) -> f32 {
        // DOI-bearing Crossref hits are the most reliable identifier we see.
        if meta.doi.is_empty() {
            0.0
        } else {
            0.10
        }
    }
}
