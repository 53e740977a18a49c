use serde::{Deserialize, Serialize};

/// What kind of work a citation points at. Drives formatter dispatch and
/// source-key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationKind {
    Journal,
    Book,
    Newspaper,
    Medical,
    Government,
    Legal,
    Url,
    #[default]
    Generic,
}

impl CitationKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "journal" | "article" => CitationKind::Journal,
            "book" => CitationKind::Book,
            "newspaper" | "news" => CitationKind::Newspaper,
            "medical" => CitationKind::Medical,
            "government" => CitationKind::Government,
            "legal" | "case" => CitationKind::Legal,
            "url" | "web" | "website" => CitationKind::Url,
            _ => CitationKind::Generic,
        }
    }
}

/// Bibliographic record produced by one resolver call. Immutable afterwards;
/// any field may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationMetadata {
    pub kind: CitationKind,
    pub title: String,
    /// Surname-first author strings, in publication order.
    pub authors: Vec<String>,
    pub year: String,
    /// Free-form publication date, e.g. "March 4, 2021".
    pub date: String,
    /// Journal, newspaper, or publisher name.
    pub container: String,
    pub volume: String,
    pub issue: String,
    pub pages: String,
    pub doi: String,
    pub url: String,
    pub access_date: String,
    /// Which provider produced this record. Diagnostic only.
    pub source_engine: String,
    pub case_name: String,
    pub case_citation: String,
    /// Echo of the raw input this record was resolved from.
    pub raw_source: String,
}

impl CitationMetadata {
    /// Count of {title, container/publisher, volume/pages} dimensions present.
    /// Used both in confidence scoring and as the federation tie-breaker.
    pub fn completeness(&self) -> usize {
        let mut n = 0;
        if !self.title.is_empty() {
            n += 1;
        }
        if !self.container.is_empty() {
            n += 1;
        }
        if !self.volume.is_empty() || !self.pages.is_empty() {
            n += 1;
        }
        n
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Surname of the first author. Handles both "Bandura, A." and
    /// "Albert Bandura" shapes.
    pub fn first_surname(&self) -> Option<String> {
        let first = self.first_author()?;
        let surname = match first.split_once(',') {
            Some((family, _)) => family.trim(),
            None => first.split_whitespace().last().unwrap_or(first),
        };
        if surname.is_empty() {
            None
        } else {
            Some(surname.to_string())
        }
    }
}

/// One in-text author-date citation recovered from body prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorYearCitation {
    /// Primary author surname, e.g. "Bandura".
    pub author: String,
    /// Four-digit year or the literal "n.d.".
    pub year: String,
    pub second_author: Option<String>,
    pub et_al: bool,
    /// The text span this citation was extracted from.
    pub span: String,
}

impl AuthorYearCitation {
    /// Dedup key: (lowercased surname, year, lowercased second author or "").
    pub fn key(&self) -> (String, String, String) {
        (
            self.author.to_lowercase(),
            self.year.clone(),
            self.second_author
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_default(),
        )
    }
}

/// A scored candidate from one provider.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: CitationMetadata,
    /// 0.0 to 1.0.
    pub confidence: f32,
    /// Why this looks like the right match.
    pub rationale: String,
}

/// Output of Phase 1 for a single note, labeled with its input position.
#[derive(Debug, Clone)]
pub struct ResolvedNote {
    pub note_id: i64,
    /// Position in document order; Phase 2 sorts on this.
    pub position: usize,
    pub raw_text: String,
    pub resolution: NoteResolution,
}

#[derive(Debug, Clone)]
pub enum NoteResolution {
    /// The note is an explicit ibid token, with optional pinpoint.
    IbidToken { pinpoint: Option<String> },
    /// Resolution succeeded: metadata plus its already-formatted full form.
    Resolved {
        metadata: Box<CitationMetadata>,
        formatted_full: String,
    },
    /// No provider produced a usable record.
    Miss,
}

/// Which citation form Phase 2 emitted for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmittedForm {
    Full,
    Short,
    Ibid,
}

/// Per-note outcome in the run report.
#[derive(Debug, Clone)]
pub enum NoteStatus {
    Rewritten(EmittedForm),
    /// Raw text kept; no usable metadata.
    ResolutionMiss,
    /// Explicit ibid with nothing before it; raw text kept.
    IbidWithoutPrecedent,
    /// XML mutation failed; note left untouched.
    WriteFailed(String),
}

#[derive(Debug, Clone)]
pub struct NoteReport {
    pub note_id: i64,
    pub original: String,
    pub formatted: Option<String>,
    pub status: NoteStatus,
}

/// Structured results log returned next to the best-effort output bytes.
/// Fatal errors land in `errors` with an empty `notes` list.
#[derive(Debug, Default)]
pub struct RunReport {
    pub notes: Vec<NoteReport>,
    pub references: Vec<ReferenceReport>,
    pub hyperlinks_added: usize,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn rewritten_count(&self) -> usize {
        self.notes
            .iter()
            .filter(|n| matches!(n.status, NoteStatus::Rewritten(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.notes.len() - self.rewritten_count()
    }

    pub fn fatal(err: String) -> Self {
        RunReport {
            errors: vec![err],
            ..Default::default()
        }
    }
}

/// One entry of the synthesized reference list (author-date mode).
#[derive(Debug, Clone)]
pub struct ReferenceReport {
    pub citation: AuthorYearCitation,
    pub formatted: String,
    pub found: bool,
}
