use crate::docx::{
    activate_links, extract_body_text, read_notes, rels_part_name, splice_references, write_note,
    Document, DocxError, NotePart, Relationships, DOCUMENT_PART, ENDNOTES_PART, FOOTNOTES_PART,
};
use crate::extract::AuthorDateExtractor;
use crate::form::FormEngine;
use crate::ibid::IbidRecognizer;
use crate::model::{
    AuthorYearCitation, NoteResolution, NoteStatus, ReferenceReport, ResolvedNote, RunReport,
};
use crate::resolver::Resolver;
use crate::style::{formatter_for, StyleFormatter};
use crate::ui::StatusUI;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Orchestrates the two document pipelines: note rewriting (parallel
/// resolution, then the sequential citation-form pass) and author-date
/// reference synthesis.
///
/// Both top-level operations are total: they return best-effort output
/// bytes next to a structured report, and fall back to the unchanged input
/// on fatal errors.
pub struct Processor {
    resolver: Arc<Resolver>,
    recognizer: Arc<IbidRecognizer>,
    extractor: AuthorDateExtractor,
    note_workers: usize,
}

impl Processor {
    pub fn new(resolver: Resolver, note_workers: usize) -> Self {
        Processor {
            resolver: Arc::new(resolver),
            recognizer: Arc::new(IbidRecognizer::new()),
            extractor: AuthorDateExtractor::new(),
            note_workers: note_workers.max(1),
        }
    }

    /// Rewrite every endnote and footnote into `style`, with ibid and
    /// short-form logic applied across each note sequence.
    pub async fn rewrite_notes(&self, bytes: &[u8], style: &str) -> (Vec<u8>, RunReport) {
        let mut doc = match Document::open(bytes) {
            Ok(doc) => doc,
            Err(err) => return (bytes.to_vec(), RunReport::fatal(err.to_string())),
        };
        let formatter: Arc<dyn StyleFormatter> = formatter_for(style).into();
        let mut report = RunReport::default();

        for part in [NotePart::Endnotes, NotePart::Footnotes] {
            if let Err(err) = self
                .rewrite_note_part(&mut doc, part, &formatter, &mut report)
                .await
            {
                report
                    .errors
                    .push(format!("{}: {}", part.part_name(), err));
            }
        }

        if let Err(err) = activate_all_links(&mut doc, &mut report) {
            report.errors.push(err.to_string());
        }

        match doc.save() {
            Ok(out) => (out, report),
            Err(err) => {
                // Packaging failure: hand back the unchanged input.
                report.errors.push(err.to_string());
                (bytes.to_vec(), report)
            }
        }
    }

    async fn rewrite_note_part(
        &self,
        doc: &mut Document,
        part: NotePart,
        formatter: &Arc<dyn StyleFormatter>,
        report: &mut RunReport,
    ) -> Result<(), DocxError> {
        let Some(xml) = doc.part_xml(part.part_name())? else {
            return Ok(());
        };
        let notes = read_notes(&xml, part)?;
        if notes.is_empty() {
            return Ok(());
        }

        // Phase 1: parallel resolution, each task owning its note and
        // emitting a position-labeled record.
        let mut resolved = self.resolve_notes(&notes, formatter).await;
        resolved.sort_by_key(|note| note.position);

        // Phase 2: strict document order; correctness depends on the
        // ledger at every step.
        let mut engine = FormEngine::new();
        let mut outcomes = engine.classify_all(&resolved, formatter.as_ref());

        let mut xml = xml;
        for outcome in &mut outcomes {
            if let Some(formatted) = &outcome.formatted {
                match write_note(&xml, part, outcome.note_id, formatted) {
                    Ok(updated) => xml = updated,
                    Err(err) => {
                        // The note stays untouched; processing continues.
                        outcome.status = NoteStatus::WriteFailed(err.to_string());
                    }
                }
            }
        }
        doc.set_part(part.part_name(), xml);
        report.notes.extend(outcomes);
        Ok(())
    }

    async fn resolve_notes(
        &self,
        notes: &[(i64, String)],
        formatter: &Arc<dyn StyleFormatter>,
    ) -> Vec<ResolvedNote> {
        let semaphore = Arc::new(Semaphore::new(self.note_workers));
        let progress = StatusUI::lookup_progress(notes.len() as u64);

        let tasks: Vec<_> = notes
            .iter()
            .enumerate()
            .map(|(position, (note_id, raw_text))| {
                let note_id = *note_id;
                let raw_text = raw_text.clone();
                let resolver = Arc::clone(&self.resolver);
                let recognizer = Arc::clone(&self.recognizer);
                let formatter = Arc::clone(formatter);
                let semaphore = Arc::clone(&semaphore);
                let progress = progress.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let resolution = if recognizer.is_ibid(&raw_text) {
                        NoteResolution::IbidToken {
                            pinpoint: recognizer.extract_pinpoint(&raw_text),
                        }
                    } else {
                        match resolver.resolve_raw(&raw_text).await {
                            Some(metadata) => NoteResolution::Resolved {
                                formatted_full: formatter.format(&metadata),
                                metadata: Box::new(metadata),
                            },
                            None => NoteResolution::Miss,
                        }
                    };
                    progress.inc(1);
                    ResolvedNote {
                        note_id,
                        position,
                        raw_text,
                        resolution,
                    }
                })
            })
            .collect();

        let joined = futures::future::join_all(tasks).await;
        progress.finish_and_clear();
        joined
            .into_iter()
            .zip(notes)
            .enumerate()
            .map(|(position, (task, (note_id, raw_text)))| {
                task.unwrap_or_else(|join_error| {
                    StatusUI::warning(&format!("lookup task panic: {}", join_error));
                    ResolvedNote {
                        note_id: *note_id,
                        position,
                        raw_text: raw_text.clone(),
                        resolution: NoteResolution::Miss,
                    }
                })
            })
            .collect()
    }

    /// Discover in-text author-date citations in the body, resolve them in
    /// parallel, and splice a formatted reference list at the end of the
    /// document.
    pub async fn build_references(&self, bytes: &[u8], style: &str) -> (Vec<u8>, RunReport) {
        let mut doc = match Document::open(bytes) {
            Ok(doc) => doc,
            Err(err) => return (bytes.to_vec(), RunReport::fatal(err.to_string())),
        };
        let mut report = RunReport::default();

        let body_xml = match doc.part_xml(DOCUMENT_PART) {
            Ok(Some(xml)) => xml,
            Ok(None) => {
                return (
                    bytes.to_vec(),
                    RunReport::fatal(DocxError::MissingPart(DOCUMENT_PART).to_string()),
                )
            }
            Err(err) => return (bytes.to_vec(), RunReport::fatal(err.to_string())),
        };
        let body = match extract_body_text(&body_xml) {
            Ok(body) => body,
            Err(err) => return (bytes.to_vec(), RunReport::fatal(err.to_string())),
        };

        let citations = self.extractor.extract_unique(&body);
        if citations.is_empty() {
            report
                .errors
                .push("no author-date citations found in document".to_string());
            return (bytes.to_vec(), report);
        }

        let formatter: Arc<dyn StyleFormatter> = formatter_for(style).into();
        let mut references = self.resolve_citations(&citations, &formatter).await;
        references.sort_by_key(|r| {
            (
                r.citation.author.to_lowercase(),
                r.citation.year.clone(),
                r.citation
                    .second_author
                    .as_deref()
                    .map(str::to_lowercase)
                    .unwrap_or_default(),
            )
        });

        let lines: Vec<String> = references.iter().map(|r| r.formatted.clone()).collect();
        match splice_references(&body_xml, heading_for_style(style), &lines) {
            Ok(xml) => doc.set_part(DOCUMENT_PART, xml),
            Err(err) => {
                report.errors.push(err.to_string());
                return (bytes.to_vec(), report);
            }
        }
        report.references = references;

        if let Err(err) = activate_all_links(&mut doc, &mut report) {
            report.errors.push(err.to_string());
        }

        match doc.save() {
            Ok(out) => (out, report),
            Err(err) => {
                report.errors.push(err.to_string());
                (bytes.to_vec(), report)
            }
        }
    }

    async fn resolve_citations(
        &self,
        citations: &[AuthorYearCitation],
        formatter: &Arc<dyn StyleFormatter>,
    ) -> Vec<ReferenceReport> {
        let semaphore = Arc::new(Semaphore::new(self.note_workers));
        let progress = StatusUI::lookup_progress(citations.len() as u64);

        let tasks: Vec<_> = citations
            .iter()
            .map(|citation| {
                let citation = citation.clone();
                let resolver = Arc::clone(&self.resolver);
                let formatter = Arc::clone(formatter);
                let semaphore = Arc::clone(&semaphore);
                let progress = progress.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let found = resolver
                        .resolve(
                            &citation.author,
                            &citation.year,
                            citation.second_author.as_deref(),
                            None,
                        )
                        .await;
                    progress.inc(1);
                    match found {
                        Some(metadata) => ReferenceReport {
                            formatted: formatter.format(&metadata),
                            citation,
                            found: true,
                        },
                        None => ReferenceReport {
                            formatted: format!(
                                "[NOT FOUND: {}, {}]",
                                citation.author, citation.year
                            ),
                            citation,
                            found: false,
                        },
                    }
                })
            })
            .collect();

        let joined = futures::future::join_all(tasks).await;
        progress.finish_and_clear();
        joined
            .into_iter()
            .zip(citations)
            .map(|(task, citation)| {
                task.unwrap_or_else(|join_error| {
                    StatusUI::warning(&format!("lookup task panic: {}", join_error));
                    ReferenceReport {
                        formatted: format!(
                            "[NOT FOUND: {}, {}]",
                            citation.author, citation.year
                        ),
                        citation: citation.clone(),
                        found: false,
                    }
                })
            })
            .collect()
    }

    /// Preview: the unique in-text citations, without any lookups.
    pub fn extract_citations(&self, bytes: &[u8]) -> Result<Vec<AuthorYearCitation>, DocxError> {
        let doc = Document::open(bytes)?;
        let xml = doc
            .part_xml(DOCUMENT_PART)?
            .ok_or(DocxError::MissingPart(DOCUMENT_PART))?;
        let body = extract_body_text(&xml)?;
        Ok(self.extractor.extract_unique(&body))
    }
}

/// Convert URL-shaped text in the body and both note parts into hyperlinks,
/// updating each part's relationship sidecar.
fn activate_all_links(doc: &mut Document, report: &mut RunReport) -> Result<(), DocxError> {
    for part_name in [DOCUMENT_PART, ENDNOTES_PART, FOOTNOTES_PART] {
        let Some(xml) = doc.part_xml(part_name)? else {
            continue;
        };
        let rels_name = rels_part_name(part_name);
        let mut rels = match doc.part_xml(&rels_name)? {
            Some(existing) => Relationships::parse(&existing)?,
            None => Relationships::new(),
        };
        let (updated, added) = activate_links(&xml, &mut rels)?;
        if added > 0 {
            doc.set_part(part_name, updated);
            doc.set_part(&rels_name, rels.to_xml()?);
            report.hyperlinks_added += added;
        }
    }
    Ok(())
}

fn heading_for_style(style: &str) -> &'static str {
    match style.trim() {
        "AAA (Anthropology)" => "References Cited",
        "Turabian Author-Date" => "Bibliography",
        _ => "References",
    }
}
