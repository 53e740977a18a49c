use super::error::DocxError;
use super::{
    collect_subtree, split_italic, text_content, write_events, write_text_runs,
    writer_into_string,
};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::io::Cursor;

/// Body prose: every text node in document order, one line per paragraph.
pub fn extract_body_text(xml: &str) -> Result<String, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_t = 0usize;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_t += 1,
            Event::End(e) if e.local_name().as_ref() == b"t" => in_t = in_t.saturating_sub(1),
            Event::End(e) if e.local_name().as_ref() == b"p" => text.push('\n'),
            Event::Text(t) if in_t > 0 => text.push_str(&t.unescape()?),
            _ => {}
        }
    }
    Ok(text)
}

fn heading_pattern() -> Regex {
    Regex::new(r"(?i)^\s*(references|references cited|bibliography)\s*$")
        .expect("heading pattern is valid")
}

/// Replace the document's reference section. The first body paragraph whose
/// text is "References", "References Cited", or "Bibliography" starts the
/// deletion range, which runs to the end of the body except the trailing
/// section properties. The new section (one Heading1 paragraph, then one
/// paragraph per reference) goes immediately before the section properties.
/// Without an existing heading nothing is deleted and the section is
/// appended.
pub fn splice_references(
    xml: &str,
    heading: &str,
    references: &[String],
) -> Result<String, DocxError> {
    let pattern = heading_pattern();
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut depth = 0usize;
    let mut in_body = false;
    let mut deleting = false;
    let mut inserted = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"body" => {
                in_body = true;
                depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"body" => {
                if !inserted {
                    write_reference_paragraphs(&mut writer, heading, references)?;
                    inserted = true;
                }
                in_body = false;
                depth -= 1;
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_body && depth == 2 && e.local_name().as_ref() == b"p" => {
                let events = collect_subtree(&mut reader)?;
                if !deleting && pattern.is_match(text_content(&events)?.trim()) {
                    deleting = true;
                }
                if deleting {
                    continue;
                }
                let end_name = String::from_utf8(e.name().as_ref().to_vec())?;
                writer.write_event(Event::Start(e))?;
                write_events(&mut writer, &events)?;
                writer.write_event(Event::End(BytesEnd::new(end_name)))?;
            }
            Event::Empty(e) if deleting && depth == 2 && e.local_name().as_ref() == b"p" => {}
            Event::Start(e) if in_body && depth == 2 && e.local_name().as_ref() == b"sectPr" => {
                if !inserted {
                    write_reference_paragraphs(&mut writer, heading, references)?;
                    inserted = true;
                }
                depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Event::Start(e) => {
                depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) => {
                depth -= 1;
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
    }

    writer_into_string(writer)
}

fn write_reference_paragraphs(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    heading: &str,
    references: &[String],
) -> Result<(), DocxError> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
    let mut style = BytesStart::new("w:pStyle");
    style.push_attribute(("w:val", "Heading1"));
    writer.write_event(Event::Empty(style))?;
    writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    write_text_runs(writer, &[(heading.to_string(), false)])?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;

    for reference in references {
        writer.write_event(Event::Start(BytesStart::new("w:p")))?;
        write_text_runs(writer, &split_italic(reference))?;
        writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t>Prose citing (Bandura, 1977) here.</w:t></w:r></w:p><w:p><w:r><w:t>References</w:t></w:r></w:p><w:p><w:r><w:t>Old entry one.</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#;

    #[test]
    fn body_text_has_one_line_per_paragraph() {
        let text = extract_body_text(DOC).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Prose citing (Bandura, 1977) here.");
        assert_eq!(lines[1], "References");
    }

    #[test]
    fn splice_replaces_from_heading_and_keeps_sect_pr() {
        let refs = vec!["Bandura, A. (1977). <i>Self-efficacy</i>.".to_string()];
        let out = splice_references(DOC, "References", &refs).unwrap();
        assert!(!out.contains("Old entry one."));
        assert!(out.contains("Prose citing (Bandura, 1977) here."));
        assert!(out.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(out.contains("Self-efficacy"));
        assert!(out.contains("<w:sectPr>"));
        // New content sits before the section properties.
        let refs_at = out.find("Self-efficacy").unwrap();
        let sect_at = out.find("<w:sectPr>").unwrap();
        assert!(refs_at < sect_at);
    }

    #[test]
    fn splice_appends_when_no_heading_exists() {
        let doc = DOC.replace("References", "Notes on method");
        let out = splice_references(&doc, "References", &["Entry.".to_string()]).unwrap();
        // Nothing deleted.
        assert!(out.contains("Old entry one."));
        assert!(out.contains("Entry."));
        let entry_at = out.find(">Entry.<").unwrap();
        let sect_at = out.find("<w:sectPr>").unwrap();
        assert!(entry_at < sect_at);
    }

    #[test]
    fn heading_match_is_case_insensitive_and_exact() {
        let pattern = heading_pattern();
        assert!(pattern.is_match("BIBLIOGRAPHY"));
        assert!(pattern.is_match("  References Cited "));
        assert!(!pattern.is_match("References to prior work"));
    }
}
