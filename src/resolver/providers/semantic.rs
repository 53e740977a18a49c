use super::{surname_first, Query, SearchProvider};
use crate::model::{CitationKind, CitationMetadata};
use crate::resolver::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";

/// Semantic Scholar graph API. Strong on psychology and social science.
pub struct SemanticScholar {
    client: Client,
}

impl SemanticScholar {
    pub fn new(client: Client) -> Self {
        SemanticScholar { client }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
struct Paper {
    title: Option<String>,
    year: Option<i64>,
    #[serde(default)]
    authors: Vec<Author>,
    venue: Option<String>,
    journal: Option<Journal>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

#[derive(Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Journal {
    name: Option<String>,
    volume: Option<String>,
    pages: Option<String>,
}

#[derive(Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl Paper {
    fn into_metadata(self) -> CitationMetadata {
        let container = self
            .journal
            .as_ref()
            .and_then(|j| j.name.clone())
            .or(self.venue)
            .unwrap_or_default();
        CitationMetadata {
            kind: CitationKind::Journal,
            title: self.title.unwrap_or_default(),
            authors: self
                .authors
                .into_iter()
                .filter_map(|a| a.name)
                .map(|name| surname_first(&name))
                .collect(),
            year: self.year.map(|y| y.to_string()).unwrap_or_default(),
            container,
            volume: self
                .journal
                .as_ref()
                .and_then(|j| j.volume.clone())
                .unwrap_or_default(),
            pages: self
                .journal
                .as_ref()
                .and_then(|j| j.pages.clone())
                .unwrap_or_default(),
            doi: self
                .external_ids
                .and_then(|ids| ids.doi)
                .unwrap_or_default(),
            source_engine: "Semantic Scholar".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for SemanticScholar {
    fn name(&self) -> &'static str {
        "Semantic Scholar"
    }

    async fn search(&self, query: &Query) -> Result<Option<CitationMetadata>, ProviderError> {
        // Semantic Scholar accepts fielded queries.
        let text = if query.author.is_empty() {
            query.raw.clone()
        } else {
            format!("author:{} year:{}", query.author, query.year)
        };

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("query", text.as_str()),
                ("limit", "3"),
                ("fields", "title,year,authors,venue,journal,externalIds"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .data
            .into_iter()
            .next()
            .map(Paper::into_metadata)
            .filter(|meta| !meta.title.is_empty()))
    }
}
