//! Event-level helpers for JATS response documents.
//!
//! A response has the shape
//!
//! ```text
//! <response>
//!   <result><total>42</total>...</result>
//!   <records>
//!     <article>...</article>
//!     <book-part-wrapper>...</book-part-wrapper>
//!   </records>
//! </response>
//! ```
//!
//! Documents are rewritten by replaying their events through a `quick_xml`
//! writer, so markup outside the spliced region is reproduced as read.

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use super::error::{Error, Result};

const RECORDS: &[u8] = b"records";

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Parse(format!("XML: {}", err))
}

/// Text of `result/total` below the document root
pub(crate) fn total_text(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => path.push(e.name().as_ref().to_vec()),
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) if is_total_path(&path) => {
                let text = t.unescape().map_err(xml_error)?;
                return Ok(Some(text.trim().to_string()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn is_total_path(path: &[Vec<u8>]) -> bool {
    path.len() == 3 && path[1] == b"result" && path[2] == b"total"
}

/// Each element child of the root's `records` element, serialized on its own
pub(crate) fn record_fragments(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut inside_records = false;
    let mut current: Option<Writer<Vec<u8>>> = None;
    let mut fragments = Vec::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.name().as_ref() == RECORDS {
                    inside_records = true;
                    continue;
                }
                if inside_records && depth == 3 {
                    current = Some(Writer::new(Vec::new()));
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.name().as_ref() == RECORDS {
                    return Ok(fragments);
                }
                if inside_records && depth == 2 {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(event.clone()).map_err(xml_error)?;
                    fragments.push(into_string(writer)?);
                    continue;
                }
            }
            Event::End(_) => {
                if inside_records && depth == 2 {
                    return Ok(fragments);
                }
                if inside_records && depth == 3 {
                    if let Some(mut writer) = current.take() {
                        writer.write_event(event.clone()).map_err(xml_error)?;
                        fragments.push(into_string(writer)?);
                    }
                    depth -= 1;
                    continue;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(fragments),
            _ => {}
        }

        if let Some(writer) = current.as_mut() {
            writer.write_event(event).map_err(xml_error)?;
        }
    }
}

/// Append every child of `source`'s `records` element to `target`'s, in order
pub(crate) fn append_records(target: &str, source: &str) -> Result<String> {
    let children = records_children(source)?;

    let mut reader = Reader::from_str(target);
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut inside_records = false;
    let mut spliced = false;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) => {
                depth += 1;
                if !spliced && depth == 2 && e.name().as_ref() == RECORDS {
                    inside_records = true;
                }
            }
            Event::Empty(e) if !spliced && depth == 1 && e.name().as_ref() == RECORDS => {
                writer
                    .write_event(Event::Start(e.clone()))
                    .map_err(xml_error)?;
                for child in &children {
                    writer.write_event(child.clone()).map_err(xml_error)?;
                }
                writer
                    .write_event(Event::End(e.to_end()))
                    .map_err(xml_error)?;
                spliced = true;
                continue;
            }
            Event::End(_) => {
                if inside_records && depth == 2 {
                    for child in &children {
                        writer.write_event(child.clone()).map_err(xml_error)?;
                    }
                    inside_records = false;
                    spliced = true;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        writer.write_event(event).map_err(xml_error)?;
    }

    if !spliced {
        return Err(Error::Parse(
            "XML: response has no records element to append to".to_string(),
        ));
    }
    into_string(writer)
}

/// All events strictly inside the root's `records` element
fn records_children(xml: &str) -> Result<Vec<Event<'static>>> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut inside_records = false;
    let mut children = Vec::new();

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) => {
                depth += 1;
                if !inside_records && depth == 2 && e.name().as_ref() == RECORDS {
                    inside_records = true;
                    continue;
                }
            }
            Event::Empty(e) if !inside_records && depth == 1 && e.name().as_ref() == RECORDS => {
                return Ok(children);
            }
            Event::End(_) => {
                if inside_records && depth == 2 {
                    return Ok(children);
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(children),
            _ => {}
        }
        if inside_records {
            children.push(event.into_owned());
        }
    }
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}
