use super::error::DocxError;
use super::rels::Relationships;
use super::{
    child_ranges, collect_subtree, range_name, text_content, write_events, writer_into_string,
};
use crate::normalize::{trim_url_match, url_pattern};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::io::Cursor;

/// Turn URL-shaped text spans into relationship-backed hyperlinks.
///
/// Every text run outside an existing hyperlink is scanned; matches are
/// replaced by the text before the URL (keeping the run's properties), a
/// `w:hyperlink` wrapping a blue underlined run, and the remainder.
/// Idempotent: runs already inside a hyperlink are left alone, and targets
/// equal under URL normalization share one relationship entry.
pub fn activate_links(xml: &str, rels: &mut Relationships) -> Result<(String, usize), DocxError> {
    let pattern = url_pattern();
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut hyperlink_depth = 0usize;
    let mut added = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"hyperlink" => {
                hyperlink_depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"hyperlink" => {
                hyperlink_depth = hyperlink_depth.saturating_sub(1);
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if hyperlink_depth == 0 && e.local_name().as_ref() == b"r" => {
                let start = e.into_owned();
                let events = collect_subtree(&mut reader)?;
                let text = text_content(&events)?;
                let has_url = pattern
                    .find_iter(&text)
                    .any(|m| !trim_url_match(m.as_str()).is_empty());
                if has_url {
                    added += rewrite_run(&mut writer, &events, &text, rels, &pattern)?;
                } else {
                    let end_name = String::from_utf8(start.name().as_ref().to_vec())?;
                    writer.write_event(Event::Start(start))?;
                    write_events(&mut writer, &events)?;
                    writer.write_event(Event::End(BytesEnd::new(end_name)))?;
                }
            }
            other => writer.write_event(other)?,
        }
    }

    Ok((writer_into_string(writer)?, added))
}

/// Emit the replacement sequence for one URL-bearing run.
fn rewrite_run(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    run_events: &[Event<'static>],
    text: &str,
    rels: &mut Relationships,
    pattern: &Regex,
) -> Result<usize, DocxError> {
    // The original run properties carry over to the plain segments.
    let run_props = child_ranges(run_events)
        .into_iter()
        .find(|&range| range_name(run_events, range) == b"rPr")
        .map(|(start, end)| &run_events[start..=end]);

    let mut added = 0usize;
    let mut cursor = 0usize;
    for m in pattern.find_iter(text) {
        let url = trim_url_match(m.as_str());
        if url.is_empty() {
            continue;
        }
        write_plain_run(writer, run_props, &text[cursor..m.start()])?;
        write_hyperlink(writer, rels, url)?;
        added += 1;
        // Trailing punctuation stays in the following plain segment.
        cursor = m.start() + url.len();
    }
    write_plain_run(writer, run_props, &text[cursor..])?;
    Ok(added)
}

fn write_plain_run(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    run_props: Option<&[Event<'static>]>,
    text: &str,
) -> Result<(), DocxError> {
    if text.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    if let Some(props) = run_props {
        write_events(writer, props)?;
    }
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

/// `<w:hyperlink r:id="…">` wrapping a blue underlined run with the URL
/// text.
fn write_hyperlink(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    rels: &mut Relationships,
    url: &str,
) -> Result<(), DocxError> {
    let rid = rels.hyperlink_id(url);
    let mut hyperlink = BytesStart::new("w:hyperlink");
    hyperlink.push_attribute(("r:id", rid.as_str()));
    writer.write_event(Event::Start(hyperlink))?;

    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
    let mut color = BytesStart::new("w:color");
    color.push_attribute(("w:val", "0000FF"));
    writer.write_event(Event::Empty(color))?;
    let mut underline = BytesStart::new("w:u");
    underline.push_attribute(("w:val", "single"));
    writer.write_event(Event::Empty(underline))?;
    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(url)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;

    writer.write_event(Event::End(BytesEnd::new("w:hyperlink")))?;
    Ok(())
}
