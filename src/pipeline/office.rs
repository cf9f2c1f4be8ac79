//! Reading Word and PowerPoint containers.
//!
//! Only the text structure is read: paragraphs of the main document part,
//! and per-shape text of each slide in presentation order. Legacy binary
//! files (`.doc`, `.ppt`) are recognised by their compound-file signature
//! so the caller can normalise them first.

use crate::error::ConvertError;
use crate::package::write_zip;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

pub const DOCX_MAIN_PART: &str = "word/document.xml";
pub const PPTX_MAIN_PART: &str = "ppt/presentation.xml";

/// Largest single part we inflate.
const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Physical container of an office file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Zip-based Office Open XML.
    OpenXml,
    /// OLE compound file (`.doc`, `.ppt`).
    LegacyBinary,
}

/// Identify the container by signature, regardless of extension.
pub fn sniff(bytes: &[u8]) -> Result<Container, ConvertError> {
    if bytes.starts_with(&ZIP_MAGIC) {
        Ok(Container::OpenXml)
    } else if bytes.starts_with(&OLE_MAGIC) {
        Ok(Container::LegacyBinary)
    } else {
        Err(ConvertError::SourceUnreadable(
            "not an office document (unknown container signature)".into(),
        ))
    }
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ConvertError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::unreadable("corrupt container", e))
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, ConvertError> {
    let entry = archive
        .by_name(name)
        .map_err(|_| ConvertError::SourceUnreadable(format!("missing part '{name}'")))?;
    let mut xml = String::new();
    entry
        .take(MAX_PART_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| ConvertError::unreadable(&format!("part '{name}' unreadable"), e))?;
    Ok(xml)
}

// ── Word ─────────────────────────────────────────────────────────────────

/// Paragraph texts of a `.docx`, in document order. Empty paragraphs are
/// kept as empty strings.
pub fn read_docx(bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let mut archive = open(bytes)?;
    let xml = read_part(&mut archive, DOCX_MAIN_PART)?;
    let mut groups = scan_text(&xml, None)?;
    let paragraphs = groups.pop().unwrap_or_default();
    debug!("Read {} paragraphs", paragraphs.len());
    Ok(paragraphs)
}

// ── PowerPoint ───────────────────────────────────────────────────────────

/// Text of every shape of every slide, in presentation order.
///
/// Each shape's paragraphs are joined with `\n`; shapes without text are
/// omitted, slides without text shapes yield an empty list.
pub fn read_pptx(bytes: &[u8]) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut archive = open(bytes)?;
    let order = slide_order(&mut archive)?;
    let mut slides = Vec::with_capacity(order.len());
    for part in order {
        let xml = read_part(&mut archive, &part)?;
        let shapes = scan_text(&xml, Some(&b"sp"[..]))?
            .into_iter()
            .map(|paras| paras.join("\n").trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        slides.push(shapes);
    }
    debug!("Read {} slides", slides.len());
    Ok(slides)
}

/// Slide part names in presentation order.
///
/// Follows `sldIdLst` through the presentation relationships. If that chain
/// is absent or broken, falls back to `ppt/slides/slideN.xml` ordered by N.
fn slide_order(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<String>, ConvertError> {
    let presentation = read_part(archive, PPTX_MAIN_PART)?;
    let ordered = match read_part(archive, "ppt/_rels/presentation.xml.rels") {
        Ok(rels) => {
            let targets = relationship_targets(&rels)?;
            slide_rel_ids(&presentation)?
                .into_iter()
                .map(|rid| targets.get(&rid).map(|t| resolve_target("ppt", t)))
                .collect::<Option<Vec<_>>>()
        }
        Err(_) => None,
    };

    if let Some(parts) = ordered {
        if parts.iter().all(|p| archive.index_for_name(p).is_some()) {
            return Ok(parts);
        }
    }

    debug!("Slide list unresolved, ordering slide parts by number");
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

fn slide_rel_ids(presentation: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(presentation);
    let mut ids = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                if let Some(rid) = prefixed_attr(&e, b"id")? {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::unreadable("presentation part malformed", e)),
        }
    }
    Ok(ids)
}

fn relationship_targets(rels: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = Reader::from_str(rels);
    let mut map = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ConvertError::unreadable("relationship malformed", e))?
                        .into_owned();
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    map.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::unreadable("relationships part malformed", e)),
        }
    }
    Ok(map)
}

/// Value of a namespaced attribute (`r:id`, whatever the prefix).
fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, ConvertError> {
    for attr in e.attributes().flatten() {
        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == local {
            let value = attr
                .unescape_value()
                .map_err(|e| ConvertError::unreadable("attribute malformed", e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            s => segments.push(s),
        }
    }
    segments.join("/")
}

// ── Shared text scan ─────────────────────────────────────────────────────

/// Collect paragraph text from WordprocessingML or DrawingML.
///
/// Paragraphs are `p` elements and text runs `t` elements in either
/// vocabulary; `tab` and `br` become `\t` and `\n`. With `group` set, only
/// text inside elements of that local name is collected, one group per
/// element. Without it, the whole part is one group.
fn scan_text(xml: &str, group: Option<&[u8]>) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut in_group = group.is_none();
    if in_group {
        groups.push(Vec::new());
    }
    let mut para: Option<String> = None;
    let mut para_depth = 0usize;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ConvertError::unreadable("document XML malformed", e))?;
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                if Some(name.as_ref()) == group {
                    in_group = true;
                    groups.push(Vec::new());
                } else if in_group {
                    match name.as_ref() {
                        b"p" => {
                            para_depth += 1;
                            para.get_or_insert_with(String::new);
                        }
                        b"t" => in_text = true,
                        _ => {}
                    }
                }
            }
            Event::Empty(e) if in_group => match e.local_name().as_ref() {
                b"p" if para.is_none() => {
                    if let Some(g) = groups.last_mut() {
                        g.push(String::new());
                    }
                }
                b"tab" => {
                    if let Some(p) = para.as_mut() {
                        p.push('\t');
                    }
                }
                b"br" | b"cr" => {
                    if let Some(p) = para.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_group && in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ConvertError::unreadable("document text malformed", e))?;
                if let Some(p) = para.as_mut() {
                    p.push_str(&text);
                }
            }
            Event::CData(t) if in_group && in_text => {
                if let Some(p) = para.as_mut() {
                    p.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if Some(name.as_ref()) == group {
                    in_group = false;
                } else if in_group {
                    match name.as_ref() {
                        b"t" => in_text = false,
                        b"p" => {
                            para_depth = para_depth.saturating_sub(1);
                            if para_depth == 0 {
                                if let (Some(p), Some(g)) = (para.take(), groups.last_mut()) {
                                    g.push(p);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(groups)
}

// ── Passthrough ──────────────────────────────────────────────────────────

/// Re-serialize a container entry by entry, in original order.
///
/// `main_part` must be present, so a presentation renamed `.docx` is
/// rejected rather than passed through under the wrong name.
pub fn repackage(bytes: &[u8], main_part: &str) -> Result<Vec<u8>, ConvertError> {
    let mut archive = open(bytes)?;
    if archive.index_for_name(main_part).is_none() {
        return Err(ConvertError::SourceUnreadable(format!(
            "missing part '{main_part}'"
        )));
    }

    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ConvertError::unreadable("corrupt container entry", e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry
            .take(MAX_PART_BYTES)
            .read_to_end(&mut data)
            .map_err(|e| ConvertError::unreadable(&format!("part '{name}' unreadable"), e))?;
        entries.push((name, data));
    }
    debug!("Repackaging {} parts", entries.len());
    write_zip(entries.iter().map(|(n, d)| (n.as_str(), d.as_slice())))
}
