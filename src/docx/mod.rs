mod body;
mod error;
mod links;
mod notes;
mod rels;

pub use body::{extract_body_text, splice_references};
pub use error::DocxError;
pub use links::activate_links;
pub use notes::{read_notes, write_note};
pub use rels::{Relationships, HYPERLINK_REL_TYPE};

use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const ENDNOTES_PART: &str = "word/endnotes.xml";
pub const FOOTNOTES_PART: &str = "word/footnotes.xml";

/// Which note part an operation targets. Carries the element, glyph, and
/// style names that differ between endnotes and footnotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotePart {
    Endnotes,
    Footnotes,
}

impl NotePart {
    pub fn part_name(self) -> &'static str {
        match self {
            NotePart::Endnotes => ENDNOTES_PART,
            NotePart::Footnotes => FOOTNOTES_PART,
        }
    }

    /// Local name of one note element, e.g. "endnote" in `<w:endnote>`.
    pub(crate) fn note_tag(self) -> &'static [u8] {
        match self {
            NotePart::Endnotes => b"endnote",
            NotePart::Footnotes => b"footnote",
        }
    }

    /// Local name of the back-reference glyph element inside a note.
    pub(crate) fn ref_tag(self) -> &'static [u8] {
        match self {
            NotePart::Endnotes => b"endnoteRef",
            NotePart::Footnotes => b"footnoteRef",
        }
    }

    pub(crate) fn ref_element(self) -> &'static str {
        match self {
            NotePart::Endnotes => "w:endnoteRef",
            NotePart::Footnotes => "w:footnoteRef",
        }
    }

    pub(crate) fn ref_style(self) -> &'static str {
        match self {
            NotePart::Endnotes => "EndnoteReference",
            NotePart::Footnotes => "FootnoteReference",
        }
    }
}

/// Relationship sidecar path for a part: `word/x.xml` maps to
/// `word/_rels/x.xml.rels`.
pub fn rels_part_name(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// A word-processing document held as its archive parts, in original order.
/// Operations read and replace individual XML parts; `save` repackages.
pub struct Document {
    parts: IndexMap<String, Vec<u8>>,
}

impl Document {
    /// Unpack the archive. Fails when the bytes are not a zip or the main
    /// body part is missing.
    pub fn open(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = IndexMap::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            parts.insert(file.name().to_string(), buf);
        }
        if !parts.contains_key(DOCUMENT_PART) {
            return Err(DocxError::MissingPart(DOCUMENT_PART));
        }
        Ok(Document { parts })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part_xml(&self, name: &str) -> Result<Option<String>, DocxError> {
        match self.parts.get(name) {
            Some(bytes) => Ok(Some(String::from_utf8(bytes.clone())?)),
            None => Ok(None),
        }
    }

    /// Replace a part, or append a new one at the end of the archive.
    pub fn set_part(&mut self, name: &str, content: String) {
        self.parts.insert(name.to_string(), content.into_bytes());
    }

    /// Repackage into a single archive preserving the original layout.
    pub fn save(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.parts {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| DocxError::Packaging(e.to_string()))?;
            writer
                .write_all(data)
                .map_err(|e| DocxError::Packaging(e.to_string()))?;
        }
        let cursor = writer
            .finish()
            .map_err(|e| DocxError::Packaging(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

// --- Shared XML event plumbing ---

/// Collect the events inside the element whose Start was just read, up to
/// but excluding its matching End.
pub(crate) fn collect_subtree(reader: &mut Reader<&[u8]>) -> Result<Vec<Event<'static>>, DocxError> {
    let mut events = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Eof => return Err(DocxError::Malformed("unexpected end of part".into())),
            Event::Start(e) => {
                depth += 1;
                events.push(Event::Start(e.into_owned()));
            }
            Event::End(e) => {
                if depth == 0 {
                    return Ok(events);
                }
                depth -= 1;
                events.push(Event::End(e.into_owned()));
            }
            other => events.push(other.into_owned()),
        }
    }
}

/// Top-level children of a collected subtree, each child reported as a
/// (start, end) index range into `events`, inclusive of its own Start/End
/// (a single index range for Empty elements).
pub(crate) fn child_ranges(events: &[Event<'static>]) -> Vec<(usize, usize)> {
    let mut children = Vec::new();
    let mut depth = 0usize;
    let mut open = 0usize;
    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Start(_) => {
                if depth == 0 {
                    open = index;
                }
                depth += 1;
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    children.push((open, index));
                }
            }
            Event::Empty(_) => {
                if depth == 0 {
                    children.push((index, index));
                }
            }
            _ => {}
        }
    }
    children
}

/// Local name of the element a child range begins with.
pub(crate) fn range_name<'a>(events: &'a [Event<'static>], range: (usize, usize)) -> &'a [u8] {
    match &events[range.0] {
        Event::Start(e) => e.local_name().into_inner(),
        Event::Empty(e) => e.local_name().into_inner(),
        _ => b"",
    }
}

/// Concatenated, unescaped content of every `w:t` element in a subtree, in
/// document order.
pub(crate) fn text_content(events: &[Event<'static>]) -> Result<String, DocxError> {
    let mut text = String::new();
    let mut in_t = 0usize;
    for event in events {
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_t += 1,
            Event::End(e) if e.local_name().as_ref() == b"t" => in_t = in_t.saturating_sub(1),
            Event::Text(t) if in_t > 0 => text.push_str(&t.unescape()?),
            _ => {}
        }
    }
    Ok(text)
}

/// Split a formatted string on `<i>…</i>` markers into (text, italic) runs.
pub(crate) fn split_italic(formatted: &str) -> Vec<(String, bool)> {
    let mut pieces = Vec::new();
    let mut rest = formatted;
    while let Some(open) = rest.find("<i>") {
        if let Some(close) = rest[open + 3..].find("</i>") {
            if open > 0 {
                pieces.push((rest[..open].to_string(), false));
            }
            pieces.push((rest[open + 3..open + 3 + close].to_string(), true));
            rest = &rest[open + 3 + close + 4..];
        } else {
            break;
        }
    }
    if !rest.is_empty() {
        pieces.push((rest.to_string(), false));
    }
    pieces
}

/// Append `<w:r>` elements for the given pieces, each holding a single
/// whitespace-preserving text node; italic pieces carry `<w:i/>` run
/// properties.
pub(crate) fn write_text_runs<W: Write>(
    writer: &mut Writer<W>,
    pieces: &[(String, bool)],
) -> Result<(), DocxError> {
    for (text, italic) in pieces {
        if text.is_empty() {
            continue;
        }
        writer.write_event(Event::Start(BytesStart::new("w:r")))?;
        if *italic {
            writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
            writer.write_event(Event::Empty(BytesStart::new("w:i")))?;
            writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        }
        let mut t = BytesStart::new("w:t");
        t.push_attribute(("xml:space", "preserve"));
        writer.write_event(Event::Start(t))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("w:t")))?;
        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    }
    Ok(())
}

/// Replay collected events into a writer.
pub(crate) fn write_events<W: Write>(
    writer: &mut Writer<W>,
    events: &[Event<'static>],
) -> Result<(), DocxError> {
    for event in events {
        writer.write_event(event.clone())?;
    }
    Ok(())
}

pub(crate) fn writer_into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, DocxError> {
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}
