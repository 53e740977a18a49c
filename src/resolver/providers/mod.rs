mod crossref;
mod openalex;
mod scholar;
mod semantic;

pub use crossref::Crossref;
pub use openalex::OpenAlex;
pub use scholar::GoogleScholar;
pub use semantic::SemanticScholar;

use super::error::ProviderError;
use crate::model::CitationMetadata;
use async_trait::async_trait;

/// A bibliographic search query. `raw` always carries the full query text;
/// the structured fields are present when the caller knows them and empty
/// otherwise. Each provider composes its own query string from these.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub raw: String,
    pub author: String,
    pub year: String,
    pub second_author: Option<String>,
}

impl Query {
    /// Plain concatenated form: "author [second] year", falling back to
    /// the raw text when no structured fields are known.
    pub fn concatenated(&self) -> String {
        if self.author.is_empty() {
            return self.raw.clone();
        }
        let mut parts = vec![self.author.clone()];
        if let Some(second) = &self.second_author {
            parts.push(second.clone());
        }
        if !self.year.is_empty() {
            parts.push(self.year.clone());
        }
        parts.join(" ")
    }
}

/// Uniform collaborator contract: one search, one optional record.
/// Implementations may fail with `ProviderError`; the federation isolates
/// those failures.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &Query) -> Result<Option<CitationMetadata>, ProviderError>;

    /// Providers verified against the returned year drop results whose
    /// year is off by more than one.
    fn verifies_year(&self) -> bool {
        false
    }

    /// Per-provider confidence adjustment, applied after the base formula:
    /// +0.10 for DOI-registry results that carry a DOI, -0.05 for
    /// web-index results that lack one.
    fn confidence_adjustment(&self, _meta: &CitationMetadata) -> f32 {
        0.0
    }
}

/// "Given Family" display name to the surname-first form the rest of the
/// pipeline expects.
pub(crate) fn surname_first(display_name: &str) -> String {
    let name = display_name.trim();
    if name.contains(',') {
        return name.to_string();
    }
    match name.rsplit_once(' ') {
        Some((given, family)) => format!("{}, {}", family, given),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_query_shapes() {
        let q = Query {
            raw: "Jones, Foo, 2001.".into(),
            ..Default::default()
        };
        assert_eq!(q.concatenated(), "Jones, Foo, 2001.");

        let q = Query {
            raw: String::new(),
            author: "Kahneman".into(),
            year: "1979".into(),
            second_author: Some("Tversky".into()),
        };
        assert_eq!(q.concatenated(), "Kahneman Tversky 1979");
    }

    #[test]
    fn surname_first_conversion() {
        assert_eq!(surname_first("Albert Bandura"), "Bandura, Albert");
        assert_eq!(surname_first("Bandura, A."), "Bandura, A.");
        assert_eq!(surname_first("Plato"), "Plato");
    }
}
