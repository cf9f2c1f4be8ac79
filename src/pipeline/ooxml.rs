//! Minimal Office Open XML writers.
//!
//! Produces the smallest part set that Word and PowerPoint (and the office
//! renderer) open without repair prompts. Styling is deliberately absent:
//! documents carry plain paragraphs, page breaks and inline pictures; decks
//! carry a title box, a body box and an optional picture per slide.

use crate::error::ConvertError;
use crate::package::write_zip;
use quick_xml::escape::escape;
use std::fmt::Write as _;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// English Metric Units per pixel at 96 DPI.
pub const EMU_PER_PX: u64 = 9525;
/// Widest inline picture in a document: 6 in.
pub const MAX_DOC_IMAGE_EMU: u64 = 6 * 914_400;
pub const SLIDE_CX: u64 = 9_144_000;
pub const SLIDE_CY: u64 = 6_858_000;

/// An encoded raster to embed, PNG or JPEG.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    /// `png` or `jpeg`.
    pub extension: &'static str,
    pub width_px: u32,
    pub height_px: u32,
}

/// Body content of a generated document.
#[derive(Debug, Clone)]
pub enum Block {
    /// `\n` becomes a line break and `\t` a tab.
    Paragraph(String),
    PageBreak,
    Image(EmbeddedImage),
}

/// One generated slide.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    pub title: Option<String>,
    pub body: Vec<String>,
    pub image: Option<EmbeddedImage>,
}

// ── Word ─────────────────────────────────────────────────────────────────

/// Write a `.docx` container holding `blocks`.
pub fn write_docx(blocks: &[Block]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    let mut rels = String::new();
    let mut media: Vec<(String, &[u8])> = Vec::new();

    for block in blocks {
        match block {
            Block::Paragraph(text) => {
                body.push_str("<w:p>");
                push_word_runs(&mut body, text);
                body.push_str("</w:p>");
            }
            Block::PageBreak => body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#),
            Block::Image(img) => {
                let n = media.len() + 1;
                let name = format!("image{n}.{}", img.extension);
                let rid = format!("rIdImg{n}");
                let _ = write!(
                    rels,
                    r#"<Relationship Id="{rid}" Type="{REL}/image" Target="media/{name}"/>"#
                );
                let (cx, cy) = fit_width(img, MAX_DOC_IMAGE_EMU);
                push_inline_picture(&mut body, n, &name, &rid, cx, cy);
                media.push((format!("word/media/{name}"), img.bytes.as_slice()));
            }
        }
    }

    let document = format!(
        r#"{XML_DECL}<w:document xmlns:w="{NS_W}" xmlns:r="{NS_R}" xmlns:wp="{NS_WP}" xmlns:a="{NS_A}" xmlns:pic="{NS_PIC}"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    );
    let content_types = format!(
        r#"{XML_DECL}<Types xmlns="{NS_TYPES}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#
    );
    let root_rels = format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL}/officeDocument" Target="word/document.xml"/></Relationships>"#
    );
    let doc_rels = format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{rels}</Relationships>"#);

    let mut parts: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/_rels/document.xml.rels", doc_rels.as_bytes()),
    ];
    parts.extend(media.iter().map(|(name, bytes)| (name.as_str(), *bytes)));
    write_zip(parts)
}

fn push_word_runs(out: &mut String, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        out.push_str("<w:r>");
        if i > 0 {
            out.push_str("<w:br/>");
        }
        for (j, piece) in line.split('\t').enumerate() {
            if j > 0 {
                out.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                let _ = write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, xml_text(piece));
            }
        }
        out.push_str("</w:r>");
    }
}

fn push_inline_picture(out: &mut String, id: usize, name: &str, rid: &str, cx: u64, cy: u64) {
    let _ = write!(
        out,
        r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}"/><a:graphic><a:graphicData uri="{NS_PIC}"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
    );
}

/// Natural size in EMU, scaled down proportionally to at most `max_cx` wide.
pub fn fit_width(img: &EmbeddedImage, max_cx: u64) -> (u64, u64) {
    let cx = (img.width_px.max(1) as u64) * EMU_PER_PX;
    let cy = (img.height_px.max(1) as u64) * EMU_PER_PX;
    if cx <= max_cx {
        (cx, cy)
    } else {
        (max_cx, (cy * max_cx / cx).max(1))
    }
}

/// Largest box with the image's aspect ratio inside `(box_cx, box_cy)`,
/// centred. Returns `(x, y, cx, cy)`.
pub fn fit_into(img: &EmbeddedImage, box_cx: u64, box_cy: u64) -> (u64, u64, u64, u64) {
    let w = img.width_px.max(1) as u64;
    let h = img.height_px.max(1) as u64;
    let (cx, cy) = if w * box_cy > h * box_cx {
        (box_cx, (h * box_cx / w).max(1))
    } else {
        ((w * box_cy / h).max(1), box_cy)
    };
    ((box_cx - cx) / 2, (box_cy - cy) / 2, cx, cy)
}

// ── PowerPoint ───────────────────────────────────────────────────────────

/// Write a `.pptx` container with one slide per entry of `slides`.
pub fn write_pptx(slides: &[Slide]) -> Result<Vec<u8>, ConvertError> {
    let mut generated: Vec<(String, Vec<u8>)> = Vec::new();
    let mut slide_ids = String::new();
    let mut pres_rels = format!(
        r#"<Relationship Id="rId1" Type="{REL}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL}/theme" Target="theme/theme1.xml"/>"#
    );
    let mut overrides = String::new();
    let mut image_no = 0usize;

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        let rid = format!("rId{}", n + 2);
        let _ = write!(slide_ids, r#"<p:sldId id="{}" r:id="{rid}"/>"#, 255 + n);
        let _ = write!(
            pres_rels,
            r#"<Relationship Id="{rid}" Type="{REL}/slide" Target="slides/slide{n}.xml"/>"#
        );
        let _ = write!(
            overrides,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );

        let mut rels = format!(
            r#"<Relationship Id="rId1" Type="{REL}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#
        );
        if let Some(img) = &slide.image {
            image_no += 1;
            let media = format!("image{image_no}.{}", img.extension);
            let _ = write!(
                rels,
                r#"<Relationship Id="rId2" Type="{REL}/image" Target="../media/{media}"/>"#
            );
            generated.push((format!("ppt/media/{media}"), img.bytes.clone()));
        }

        generated.push((format!("ppt/slides/slide{n}.xml"), slide_xml(slide).into_bytes()));
        generated.push((
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{rels}</Relationships>"#)
                .into_bytes(),
        ));
    }

    let slide_list = if slide_ids.is_empty() {
        String::new()
    } else {
        format!("<p:sldIdLst>{slide_ids}</p:sldIdLst>")
    };
    let presentation = format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{slide_list}<p:sldSz cx="{SLIDE_CX}" cy="{SLIDE_CY}"/><p:notesSz cx="{SLIDE_CY}" cy="{SLIDE_CX}"/></p:presentation>"#
    );
    let content_types = format!(
        r#"{XML_DECL}<Types xmlns="{NS_TYPES}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{overrides}</Types>"#
    );
    let root_rels = format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
    );
    let pres_rels =
        format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{pres_rels}</Relationships>"#);
    let master = format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    );
    let master_rels = format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    );
    let layout = format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    );
    let layout_rels = format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    );
    let theme = theme_xml();

    let mut parts: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("ppt/presentation.xml", presentation.as_bytes()),
        ("ppt/_rels/presentation.xml.rels", pres_rels.as_bytes()),
        ("ppt/slideMasters/slideMaster1.xml", master.as_bytes()),
        ("ppt/slideMasters/_rels/slideMaster1.xml.rels", master_rels.as_bytes()),
        ("ppt/slideLayouts/slideLayout1.xml", layout.as_bytes()),
        ("ppt/slideLayouts/_rels/slideLayout1.xml.rels", layout_rels.as_bytes()),
        ("ppt/theme/theme1.xml", theme.as_bytes()),
    ];
    parts.extend(generated.iter().map(|(name, bytes)| (name.as_str(), bytes.as_slice())));
    write_zip(parts)
}

const EMPTY_TREE: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#;

fn slide_xml(slide: &Slide) -> String {
    let mut tree = String::from(EMPTY_TREE);
    let mut shape_id = 2;

    if let Some(title) = slide.title.as_deref() {
        push_text_shape(
            &mut tree,
            shape_id,
            "Title",
            (457_200, 274_638, 8_229_600, 1_143_000),
            &[title],
            3200,
            true,
        );
        shape_id += 1;
    }
    if !slide.body.is_empty() {
        let top = if slide.title.is_some() { 1_600_200 } else { 457_200 };
        let lines: Vec<&str> = slide.body.iter().map(String::as_str).collect();
        push_text_shape(
            &mut tree,
            shape_id,
            "Content",
            (457_200, top, 8_229_600, SLIDE_CY - top - 457_200),
            &lines,
            1800,
            false,
        );
        shape_id += 1;
    }
    if let Some(img) = &slide.image {
        let (x, y, cx, cy) = fit_into(img, SLIDE_CX, SLIDE_CY);
        let _ = write!(
            tree,
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{shape_id}" name="Picture {shape_id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        );
    }

    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{tree}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn push_text_shape(
    out: &mut String,
    id: u32,
    name: &str,
    (x, y, cx, cy): (u64, u64, u64, u64),
    paragraphs: &[&str],
    size: u32,
    bold: bool,
) {
    let b = if bold { r#" b="1""# } else { "" };
    let _ = write!(
        out,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name} {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#
    );
    for para in paragraphs {
        let _ = write!(
            out,
            r#"<a:p><a:r><a:rPr lang="en-US" sz="{size}"{b} dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
            xml_text(para)
        );
    }
    out.push_str("</p:txBody></p:sp>");
}

fn theme_xml() -> String {
    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = format!(r#"<a:ln w="9525">{solid}</a:ln>"#);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    let font = r#"<a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/>"#;
    let accents: String = ["4F81BD", "C0504D", "9BBB59", "8064A2", "4BACC6", "F79646"]
        .iter()
        .enumerate()
        .map(|(i, c)| format!(r#"<a:accent{n}><a:srgbClr val="{c}"/></a:accent{n}>"#, n = i + 1))
        .collect();
    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2>{accents}<a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont>{font}</a:majorFont><a:minorFont>{font}</a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{fills}</a:fillStyleLst><a:lnStyleLst>{lines}</a:lnStyleLst><a:effectStyleLst>{effects}</a:effectStyleLst><a:bgFillStyleLst>{fills}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        fills = solid.repeat(3),
        lines = line.repeat(3),
        effects = effect.repeat(3),
    )
}

/// Escape `text` for element content, dropping characters XML 1.0 forbids.
pub fn xml_text(text: &str) -> String {
    let clean: String = text
        .chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect();
    escape(clean.as_str()).into_owned()
}
