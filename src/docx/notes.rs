use super::error::DocxError;
use super::{
    child_ranges, collect_subtree, range_name, split_italic, text_content, write_events,
    write_text_runs, writer_into_string, NotePart,
};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Raw note texts in document order, keyed by note ID. IDs 0 and -1 are
/// the separator markers and are never enumerated as content.
pub fn read_notes(xml: &str, part: NotePart) -> Result<Vec<(i64, String)>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut notes = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == part.note_tag() => {
                let id = note_id(&e)?;
                let events = collect_subtree(&mut reader)?;
                if let Some(id) = id.filter(|&id| id >= 1) {
                    notes.push((id, text_content(&events)?));
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == part.note_tag() => {
                if let Some(id) = note_id(&e)?.filter(|&id| id >= 1) {
                    notes.push((id, String::new()));
                }
            }
            _ => {}
        }
    }
    Ok(notes)
}

/// Rewrite one note's content in place. The paragraph properties and the
/// note-reference run survive; everything else in the paragraph is replaced
/// by runs built from the formatted string, splitting on italic markers.
pub fn write_note(
    xml: &str,
    part: NotePart,
    note_id_wanted: i64,
    formatted: &str,
) -> Result<String, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut found = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == part.note_tag() => {
                let events = collect_subtree(&mut reader)?;
                if note_id(&e)? == Some(note_id_wanted) {
                    let start = e.into_owned();
                    let end_name = String::from_utf8(start.name().as_ref().to_vec())?;
                    writer.write_event(Event::Start(start))?;
                    rebuild_note(&mut writer, &events, part, formatted)?;
                    writer.write_event(Event::End(BytesEnd::new(end_name)))?;
                    found = true;
                } else {
                    let end_name = String::from_utf8(e.name().as_ref().to_vec())?;
                    writer.write_event(Event::Start(e))?;
                    write_events(&mut writer, &events)?;
                    writer.write_event(Event::End(BytesEnd::new(end_name)))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == part.note_tag() => {
                if note_id(&e)? == Some(note_id_wanted) {
                    let start = e.into_owned();
                    let end_name = String::from_utf8(start.name().as_ref().to_vec())?;
                    writer.write_event(Event::Start(start))?;
                    rebuild_note(&mut writer, &[], part, formatted)?;
                    writer.write_event(Event::End(BytesEnd::new(end_name)))?;
                    found = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            other => writer.write_event(other)?,
        }
    }

    if !found {
        return Err(DocxError::Malformed(format!(
            "no note with id {}",
            note_id_wanted
        )));
    }
    writer_into_string(writer)
}

fn note_id(e: &BytesStart) -> Result<Option<i64>, DocxError> {
    match e.try_get_attribute("w:id")? {
        Some(attr) => Ok(attr.unescape_value()?.trim().parse::<i64>().ok()),
        None => Ok(None),
    }
}

fn rebuild_note(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    note_events: &[Event<'static>],
    part: NotePart,
    formatted: &str,
) -> Result<(), DocxError> {
    let children = child_ranges(note_events);
    let paragraph = children
        .iter()
        .copied()
        .find(|&range| range_name(note_events, range) == b"p" && range.0 != range.1);

    let (paragraph_events, p_end_name) = match paragraph {
        Some((start, end)) => {
            // Reuse the original paragraph tag, attributes included.
            let start_event = note_events[start].clone();
            let name = match &start_event {
                Event::Start(e) => String::from_utf8(e.name().as_ref().to_vec())?,
                _ => "w:p".to_string(),
            };
            writer.write_event(start_event)?;
            (&note_events[start + 1..end], name)
        }
        None => {
            writer.write_event(Event::Start(BytesStart::new("w:p")))?;
            (&note_events[0..0], "w:p".to_string())
        }
    };

    let p_children = child_ranges(paragraph_events);
    if let Some(&range) = p_children
        .iter()
        .find(|&&r| range_name(paragraph_events, r) == b"pPr")
    {
        write_events(writer, &paragraph_events[range.0..=range.1])?;
    }

    let reference_run = p_children.iter().copied().find(|&range| {
        range_name(paragraph_events, range) == b"r"
            && is_reference_run(&paragraph_events[range.0..=range.1], part)
    });
    match reference_run {
        Some((start, end)) => write_events(writer, &paragraph_events[start..=end])?,
        None => synthesize_reference_run(writer, part)?,
    }

    write_text_runs(writer, &split_italic(formatted))?;
    writer.write_event(Event::End(BytesEnd::new(p_end_name)))?;
    Ok(())
}

/// The run carrying the superscript note glyph: it either contains the
/// `endnoteRef`/`footnoteRef` element or is styled with the matching
/// reference character style.
fn is_reference_run(run_events: &[Event<'static>], part: NotePart) -> bool {
    run_events.iter().any(|event| match event {
        Event::Start(e) | Event::Empty(e) => {
            if e.local_name().as_ref() == part.ref_tag() {
                return true;
            }
            if e.local_name().as_ref() == b"rStyle" {
                if let Ok(Some(attr)) = e.try_get_attribute("w:val") {
                    if let Ok(value) = attr.unescape_value() {
                        return value == part.ref_style();
                    }
                }
            }
            false
        }
        _ => false,
    })
}

fn synthesize_reference_run(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    part: NotePart,
) -> Result<(), DocxError> {
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
    let mut style = BytesStart::new("w:rStyle");
    style.push_attribute(("w:val", part.ref_style()));
    writer.write_event(Event::Empty(style))?;
    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    writer.write_event(Event::Empty(BytesStart::new(part.ref_element())))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDNOTES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:endnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:endnote w:type="separator" w:id="-1"><w:p><w:r><w:separator/></w:r></w:p></w:endnote><w:endnote w:type="continuationSeparator" w:id="0"><w:p><w:r><w:continuationSeparator/></w:r></w:p></w:endnote><w:endnote w:id="1"><w:p><w:pPr><w:pStyle w:val="EndnoteText"/></w:pPr><w:r><w:rPr><w:rStyle w:val="EndnoteReference"/></w:rPr><w:endnoteRef/></w:r><w:r><w:t xml:space="preserve"> Jones, Foo, 2001.</w:t></w:r></w:p></w:endnote><w:endnote w:id="2"><w:p><w:r><w:t>Ibid., 45</w:t></w:r></w:p></w:endnote></w:endnotes>"#;

    #[test]
    fn reads_content_notes_and_skips_markers() {
        let notes = read_notes(ENDNOTES, NotePart::Endnotes).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], (1, " Jones, Foo, 2001.".to_string()));
        assert_eq!(notes[1], (2, "Ibid., 45".to_string()));
    }

    #[test]
    fn write_preserves_style_and_reference_run() {
        let out = write_note(ENDNOTES, NotePart::Endnotes, 1, "Formatted, <i>Title</i>, 2001.")
            .unwrap();
        assert!(out.contains(r#"<w:pStyle w:val="EndnoteText"/>"#));
        assert!(out.contains("<w:endnoteRef/>"));
        assert!(out.contains("<w:i/>"));
        // The old content run is gone.
        assert!(!out.contains("Jones, Foo"));

        let notes = read_notes(&out, NotePart::Endnotes).unwrap();
        assert_eq!(notes[0], (1, "Formatted, Title, 2001.".to_string()));
        // The other note is untouched.
        assert_eq!(notes[1], (2, "Ibid., 45".to_string()));
    }

    #[test]
    fn missing_reference_run_is_synthesized() {
        let out = write_note(ENDNOTES, NotePart::Endnotes, 2, "Short form.").unwrap();
        let rebuilt = out
            .split("<w:endnote w:id=\"2\">")
            .nth(1)
            .unwrap();
        assert!(rebuilt.contains(r#"<w:rStyle w:val="EndnoteReference"/>"#));
        assert!(rebuilt.contains("<w:endnoteRef/>"));
    }

    #[test]
    fn roundtrip_keeps_text_per_note_id() {
        let before = read_notes(ENDNOTES, NotePart::Endnotes).unwrap();
        let mut xml = ENDNOTES.to_string();
        for (id, text) in &before {
            xml = write_note(&xml, NotePart::Endnotes, *id, text).unwrap();
        }
        let after = read_notes(&xml, NotePart::Endnotes).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn unknown_note_id_is_an_error() {
        assert!(write_note(ENDNOTES, NotePart::Endnotes, 9, "x").is_err());
    }

    #[test]
    fn footnote_part_uses_its_own_names() {
        let footnotes = ENDNOTES
            .replace("endnote", "footnote")
            .replace("EndnoteText", "FootnoteText")
            .replace("EndnoteReference", "FootnoteReference");
        let out = write_note(&footnotes, NotePart::Footnotes, 2, "New.").unwrap();
        assert!(out.contains(r#"<w:rStyle w:val="FootnoteReference"/>"#));
        assert!(out.contains("<w:footnoteRef/>"));
    }
}
