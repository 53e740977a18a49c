use crate::history::History;
use crate::model::{EmittedForm, NoteReport, NoteResolution, NoteStatus, ResolvedNote};
use crate::normalize::urls_match;
use crate::style::StyleFormatter;

/// Sequential classifier that decides, per note, whether to emit a full,
/// short-form, or ibid citation. Runs after Phase 1, strictly in document
/// order; every decision depends only on the current metadata and the
/// accumulated history ledger.
pub struct FormEngine {
    history: History,
}

impl Default for FormEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FormEngine {
    pub fn new() -> Self {
        FormEngine {
            history: History::new(),
        }
    }

    /// Classify every resolved note. `notes` must already be in document
    /// order; Phase 1 labels records with their input position for this.
    pub fn classify_all(
        &mut self,
        notes: &[ResolvedNote],
        formatter: &dyn StyleFormatter,
    ) -> Vec<NoteReport> {
        notes
            .iter()
            .map(|note| self.classify(note, formatter))
            .collect()
    }

    fn classify(&mut self, note: &ResolvedNote, formatter: &dyn StyleFormatter) -> NoteReport {
        let (formatted, status) = match &note.resolution {
            // S0: explicit ibid token. Without a precedent the raw text is
            // kept; either way nothing is pushed, a bare token carries no
            // structured metadata and would corrupt the ledger.
            NoteResolution::IbidToken { pinpoint } => {
                if self.history.previous().is_none() {
                    (None, NoteStatus::IbidWithoutPrecedent)
                } else {
                    (
                        Some(formatter.format_ibid(pinpoint.as_deref())),
                        NoteStatus::Rewritten(EmittedForm::Ibid),
                    )
                }
            }
            // S1: resolution failed; keep the original text.
            NoteResolution::Miss => (None, NoteStatus::ResolutionMiss),
            NoteResolution::Resolved {
                metadata,
                formatted_full,
            } => {
                let previous_url = self
                    .history
                    .previous()
                    .map(|prev| prev.metadata.url.clone())
                    .unwrap_or_default();

                if !metadata.url.is_empty() && urls_match(&metadata.url, &previous_url) {
                    // S2: same URL as the previous note. No history push;
                    // see S3 for the asymmetry.
                    (
                        Some(formatter.format_ibid(None)),
                        NoteStatus::Rewritten(EmittedForm::Ibid),
                    )
                } else if self.history.is_same_as_previous(metadata) {
                    // S3: structurally the same source as the previous
                    // note. Pushed: the fresh metadata feeds later
                    // short-form detection.
                    let text = formatter.format_ibid(None);
                    self.history.add(metadata, &text);
                    (Some(text), NoteStatus::Rewritten(EmittedForm::Ibid))
                } else if self.history.has_been_cited_before(metadata) {
                    // S4: cited earlier, but not immediately prior.
                    let text = formatter.format_short(metadata);
                    self.history.add(metadata, &text);
                    (Some(text), NoteStatus::Rewritten(EmittedForm::Short))
                } else {
                    // S5: first appearance.
                    self.history.add(metadata, formatted_full);
                    (
                        Some(formatted_full.clone()),
                        NoteStatus::Rewritten(EmittedForm::Full),
                    )
                }
            }
        };

        NoteReport {
            note_id: note.note_id,
            original: note.raw_text.clone(),
            formatted,
            status,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CitationMetadata, ResolvedNote};
    use crate::style::ChicagoNotes;

    fn resolved(id: i64, position: usize, meta: CitationMetadata) -> ResolvedNote {
        let formatted_full = ChicagoNotes.format(&meta);
        ResolvedNote {
            note_id: id,
            position,
            raw_text: meta.raw_source.clone(),
            resolution: NoteResolution::Resolved {
                metadata: Box::new(meta),
                formatted_full,
            },
        }
    }

    fn jones() -> CitationMetadata {
        CitationMetadata {
            title: "Foo".into(),
            authors: vec!["Jones, A.".into()],
            year: "2001".into(),
            pages: "15".into(),
            raw_source: "Jones, Foo, 2001.".into(),
            ..Default::default()
        }
    }

    fn smith() -> CitationMetadata {
        CitationMetadata {
            title: "Bar".into(),
            authors: vec!["Smith, B.".into()],
            year: "2010".into(),
            raw_source: "Smith, Bar, 2010.".into(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_then_ibid() {
        let notes = vec![
            resolved(1, 0, jones()),
            ResolvedNote {
                note_id: 2,
                position: 1,
                raw_text: "Ibid., 45".into(),
                resolution: NoteResolution::IbidToken {
                    pinpoint: Some("45".into()),
                },
            },
        ];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert!(matches!(out[0].status, NoteStatus::Rewritten(EmittedForm::Full)));
        assert_eq!(out[1].formatted.as_deref(), Some("Ibid., 45."));
        // An explicit token never reaches the ledger.
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn fresh_interleaved_repeat_goes_short() {
        let notes = vec![
            resolved(1, 0, jones()),
            resolved(2, 1, smith()),
            resolved(3, 2, jones()),
        ];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert!(matches!(out[0].status, NoteStatus::Rewritten(EmittedForm::Full)));
        assert!(matches!(out[1].status, NoteStatus::Rewritten(EmittedForm::Full)));
        assert!(matches!(out[2].status, NoteStatus::Rewritten(EmittedForm::Short)));
        let short = out[2].formatted.as_deref().unwrap();
        assert!(short.starts_with("Jones"));
        assert!(short.contains("15"));
    }

    #[test]
    fn url_ibid_after_normalization() {
        let mut first = CitationMetadata {
            title: "Page".into(),
            ..Default::default()
        };
        first.url = "https://example.org/a?utm=x".into();
        let mut second = first.clone();
        second.url = "https://example.org/a/".into();

        let notes = vec![resolved(1, 0, first), resolved(2, 1, second)];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert_eq!(out[1].formatted.as_deref(), Some("Ibid."));
        // S2 does not push; only the first note is on the ledger.
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn ibid_without_precedent_keeps_original() {
        let notes = vec![ResolvedNote {
            note_id: 1,
            position: 0,
            raw_text: "ibid.".into(),
            resolution: NoteResolution::IbidToken { pinpoint: None },
        }];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert!(matches!(out[0].status, NoteStatus::IbidWithoutPrecedent));
        assert!(out[0].formatted.is_none());
    }

    #[test]
    fn same_source_back_to_back_is_structural_ibid() {
        let notes = vec![resolved(1, 0, jones()), resolved(2, 1, jones())];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert!(matches!(out[1].status, NoteStatus::Rewritten(EmittedForm::Ibid)));
        // S3 pushes: both ordinals recorded.
        assert_eq!(engine.history().len(), 2);
    }

    #[test]
    fn misses_leave_no_trace() {
        let notes = vec![
            ResolvedNote {
                note_id: 1,
                position: 0,
                raw_text: "gibberish".into(),
                resolution: NoteResolution::Miss,
            },
            resolved(2, 1, jones()),
        ];
        let mut engine = FormEngine::new();
        let out = engine.classify_all(&notes, &ChicagoNotes);
        assert!(matches!(out[0].status, NoteStatus::ResolutionMiss));
        assert!(matches!(out[1].status, NoteStatus::Rewritten(EmittedForm::Full)));
    }
}
