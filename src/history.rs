use crate::model::CitationMetadata;
use crate::normalize::source_key;
use indexmap::IndexMap;

/// One emitted citation remembered by the ledger.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub metadata: CitationMetadata,
    pub formatted: String,
    pub source_key: Option<String>,
    /// Strictly increasing per `History::add`.
    pub ordinal: usize,
}

/// Ordered ledger of previously emitted citations, scoped to one document.
///
/// `seen` keeps the *first* occurrence of each source key, not the most
/// recent; a short-form citation must not be reclassified as new after many
/// interleaving citations.
#[derive(Debug, Default)]
pub struct History {
    previous: Option<HistoryEntry>,
    seen: IndexMap<String, HistoryEntry>,
    ordinal: usize,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Record an emitted citation. Inserts into `seen` iff the source key
    /// is non-null and not already present.
    pub fn add(&mut self, metadata: &CitationMetadata, formatted: &str) {
        self.ordinal += 1;
        let key = source_key(metadata);
        let entry = HistoryEntry {
            metadata: metadata.clone(),
            formatted: formatted.to_string(),
            source_key: key.clone(),
            ordinal: self.ordinal,
        };
        if let Some(key) = key {
            self.seen.entry(key).or_insert_with(|| entry.clone());
        }
        self.previous = Some(entry);
    }

    /// True iff the immediately preceding citation refers to the same source.
    pub fn is_same_as_previous(&self, metadata: &CitationMetadata) -> bool {
        match (&self.previous, source_key(metadata)) {
            (Some(prev), Some(key)) => prev.source_key.as_deref() == Some(key.as_str()),
            _ => false,
        }
    }

    /// True iff this source was cited anywhere earlier in the document.
    pub fn has_been_cited_before(&self, metadata: &CitationMetadata) -> bool {
        match source_key(metadata) {
            Some(key) => self.seen.contains_key(&key),
            None => false,
        }
    }

    pub fn previous(&self) -> Option<&HistoryEntry> {
        self.previous.as_ref()
    }

    /// First occurrence of a source, if it was ever recorded.
    pub fn first_occurrence(&self, metadata: &CitationMetadata) -> Option<&HistoryEntry> {
        self.seen.get(&source_key(metadata)?)
    }

    pub fn len(&self) -> usize {
        self.ordinal
    }

    pub fn is_empty(&self) -> bool {
        self.ordinal == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> CitationMetadata {
        CitationMetadata {
            title: title.to_string(),
            authors: vec!["Jones, A.".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn ordinals_strictly_increase() {
        let mut h = History::new();
        h.add(&meta("One"), "One.");
        h.add(&meta("Two"), "Two.");
        h.add(&meta("One"), "One again.");
        assert_eq!(h.previous().unwrap().ordinal, 3);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn seen_keeps_the_first_occurrence() {
        let mut h = History::new();
        h.add(&meta("One"), "first form");
        h.add(&meta("Two"), "Two.");
        h.add(&meta("One"), "second form");
        let first = h.first_occurrence(&meta("One")).unwrap();
        assert_eq!(first.formatted, "first form");
        assert_eq!(first.ordinal, 1);
    }

    #[test]
    fn same_as_previous_tracks_only_the_last_entry() {
        let mut h = History::new();
        h.add(&meta("One"), "One.");
        assert!(h.is_same_as_previous(&meta("One")));
        h.add(&meta("Two"), "Two.");
        assert!(!h.is_same_as_previous(&meta("One")));
        assert!(h.has_been_cited_before(&meta("One")));
    }

    #[test]
    fn keyless_metadata_is_never_seen() {
        let mut h = History::new();
        let keyless = CitationMetadata::default();
        h.add(&keyless, "??");
        assert!(!h.has_been_cited_before(&keyless));
        assert!(!h.is_same_as_previous(&keyless));
    }
}
