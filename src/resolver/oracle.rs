use super::error::OracleError;
use crate::model::{CitationKind, CitationMetadata};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

const MODEL_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

const GUESS_PROMPT: &str = r#"You are identifying a scholarly work from a partial citation. Using only well-established bibliographic knowledge, identify the work this citation most likely refers to and report its metadata.

Rules:
1. Only report a work you are confident actually exists. Never invent titles, volumes, or DOIs.
2. The authors field must list full names, surname first (e.g. "Bandura, Albert").
3. Set confidence between 0.0 and 1.0 reflecting how certain you are this is the intended work. Use 0.0 if you cannot identify it.
4. Leave any unknown field as an empty string.

Citation: {query}"#;

/// Contextual fallback for citations the structured providers cannot find.
/// Returns a schema-validated guess; anything off-schema is rejected at
/// this boundary rather than silently defaulted.
#[async_trait]
pub trait GuessOracle: Send + Sync {
    async fn guess(&self, query: &str) -> Result<OracleGuess, OracleError>;
}

/// A guessed citation. `kind` is a tag from the response schema; unknown
/// tags map to the generic kind.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleGuess {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub pages: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub doi: String,
    pub confidence: f32,
}

impl OracleGuess {
    pub fn into_metadata(self, fallback_year: &str) -> CitationMetadata {
        let container = if self.journal.is_empty() {
            self.publisher
        } else {
            self.journal
        };
        CitationMetadata {
            kind: CitationKind::from_tag(&self.kind),
            title: self.title,
            authors: self.authors,
            year: if self.year.is_empty() {
                fallback_year.to_string()
            } else {
                self.year
            },
            container,
            volume: self.volume,
            issue: self.issue,
            pages: self.pages,
            doi: self.doi,
            source_engine: "Gemini AI".to_string(),
            ..Default::default()
        }
    }
}

// --- Structs for content generation ---

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini with a structured-output response schema.
pub struct GeminiOracle {
    client: Client,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(client: Client, api_key: String) -> Self {
        GeminiOracle { client, api_key }
    }

    pub fn from_env(client: Client) -> Option<Self> {
        dotenvy::dotenv().ok();
        std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .map(|key| Self::new(client, key))
    }

    fn response_schema() -> serde_json::Value {
        let string = |description: &str| {
            serde_json::json!({ "type": "string", "description": description })
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["journal", "book", "newspaper", "medical", "government", "legal", "url", "generic"],
                    "description": "What kind of work this is"
                },
                "title": string("Exact title of the work"),
                "authors": {
                    "type": "array",
                    "items": string("Full author name, surname first"),
                },
                "year": string("Four-digit publication year"),
                "journal": string("Journal or periodical name, if any"),
                "volume": string("Volume number, if any"),
                "issue": string("Issue number, if any"),
                "pages": string("Page range, if any"),
                "publisher": string("Publisher, for books"),
                "doi": string("DOI if one is known with certainty"),
                "confidence": {
                    "type": "number",
                    "description": "How certain the identification is, 0.0 to 1.0"
                }
            },
            "required": ["title", "confidence"]
        })
    }
}

#[async_trait]
impl GuessOracle for GeminiOracle {
    async fn guess(&self, query: &str) -> Result<OracleGuess, OracleError> {
        let prompt = GUESS_PROMPT.replace("{query}", query);
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Self::response_schema(),
            },
        };

        let response = self
            .client
            .post(MODEL_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(OracleError::ApiError(format!(
                "Content generation failed: {}",
                error_text
            )));
        }

        let gen_response: GenerateContentResponse = response.json().await?;
        let text = gen_response
            .candidates
            .and_then(|mut c| c.pop())
            .and_then(|c| c.content)
            .and_then(|co| co.parts)
            .and_then(|mut p| p.pop())
            .and_then(|p| p.text)
            .ok_or(OracleError::ContentMissing)?;

        let mut guess: OracleGuess = serde_json::from_str(&text)?;
        guess.confidence = guess.confidence.clamp(0.0, 1.0);
        Ok(guess)
    }
}
