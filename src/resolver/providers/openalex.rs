use super::{surname_first, Query, SearchProvider};
use crate::model::{CitationKind, CitationMetadata};
use crate::resolver::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const API_URL: &str = "https://api.openalex.org/works";

/// OpenAlex. Open-access index with broad coverage.
pub struct OpenAlex {
    client: Client,
}

impl OpenAlex {
    pub fn new(client: Client) -> Self {
        OpenAlex { client }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    title: Option<String>,
    publication_year: Option<i64>,
    publication_date: Option<String>,
    doi: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    biblio: Option<Biblio>,
    primary_location: Option<Location>,
    #[serde(rename = "type")]
    work_type: Option<String>,
}

#[derive(Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct Biblio {
    volume: Option<String>,
    issue: Option<String>,
    first_page: Option<String>,
    last_page: Option<String>,
}

#[derive(Deserialize)]
struct Location {
    source: Option<Source>,
}

#[derive(Deserialize)]
struct Source {
    display_name: Option<String>,
}

impl Work {
    fn into_metadata(self) -> CitationMetadata {
        let kind = match self.work_type.as_deref() {
            Some("article") => CitationKind::Journal,
            Some("book") | Some("book-chapter") => CitationKind::Book,
            _ => CitationKind::Generic,
        };
        let pages = match self.biblio.as_ref() {
            Some(Biblio {
                first_page: Some(first),
                last_page: Some(last),
                ..
            }) => format!("{}-{}", first, last),
            Some(Biblio {
                first_page: Some(first),
                ..
            }) => first.clone(),
            _ => String::new(),
        };
        // OpenAlex reports DOIs as resolver URLs; normalization strips the
        // prefix at comparison time.
        CitationMetadata {
            kind,
            title: self.title.unwrap_or_default(),
            authors: self
                .authorships
                .into_iter()
                .filter_map(|a| a.author.and_then(|a| a.display_name))
                .map(|name| surname_first(&name))
                .collect(),
            year: self
                .publication_year
                .map(|y| y.to_string())
                .unwrap_or_default(),
            date: self.publication_date.unwrap_or_default(),
            container: self
                .primary_location
                .and_then(|l| l.source)
                .and_then(|s| s.display_name)
                .unwrap_or_default(),
            volume: self.biblio.as_ref().and_then(|b| b.volume.clone()).unwrap_or_default(),
            issue: self.biblio.as_ref().and_then(|b| b.issue.clone()).unwrap_or_default(),
            pages,
            doi: self.doi.unwrap_or_default(),
            source_engine: "OpenAlex".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for OpenAlex {
    fn name(&self) -> &'static str {
        "OpenAlex"
    }

    async fn search(&self, query: &Query) -> Result<Option<CitationMetadata>, ProviderError> {
        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("search", query.concatenated().as_str()),
                ("per_page", "3"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(Work::into_metadata)
            .filter(|meta| !meta.title.is_empty()))
    }

    fn verifies_year(&self) -> bool {
        true
    }
}
