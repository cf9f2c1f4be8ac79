//! In-process PDF writing with lopdf.
//!
//! Two page shapes are produced:
//!
//! * **Text pages**: Helvetica 11 pt on A4, 14 pt leading, 50 pt margins.
//!   Paragraphs wrap at a fixed character width and flow onto a new page
//!   when the next line would cross the bottom margin. This is the
//!   structural Word/PowerPoint → PDF render.
//! * **Image pages**: one page per raster, sized to the raster's pixel
//!   dimensions (1 px = 1 pt), the image filling the page.
//!
//! Output carries no document ID and no dates, so equal input gives equal
//! bytes.

use crate::error::ConvertError;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

pub const PAGE_WIDTH: i64 = 595;
pub const PAGE_HEIGHT: i64 = 842;
pub const MARGIN: i64 = 50;
pub const FONT_SIZE: i64 = 11;
pub const LINE_HEIGHT: i64 = 14;

/// Lines that fit between the top and bottom margins.
pub const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LINE_HEIGHT) as usize;

/// Wrap and paginate `sections`. Each section starts a new page; a section
/// with no text still yields one (blank) page.
pub fn paginate(sections: &[Vec<String>], max_line_chars: usize) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    for section in sections {
        let mut page: Vec<String> = Vec::new();
        for paragraph in section {
            let wrapped: Vec<String> = if paragraph.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(paragraph.trim_end(), max_line_chars)
                    .into_iter()
                    .map(|l| l.into_owned())
                    .collect()
            };
            for line in wrapped {
                if page.len() == LINES_PER_PAGE {
                    pages.push(std::mem::take(&mut page));
                }
                page.push(line);
            }
        }
        pages.push(page);
    }
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

/// Render `sections` as a text-only PDF.
pub fn text_pdf(sections: &[Vec<String>], max_line_chars: usize) -> Result<Vec<u8>, ConvertError> {
    let pages = paginate(sections, max_line_chars);
    let mut pdf = PdfBuilder::new();

    let font_id = pdf.doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };

    for lines in &pages {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE)]),
            Operation::new("TL", vec![Object::Integer(LINE_HEIGHT)]),
            Operation::new(
                "Td",
                vec![
                    Object::Integer(MARGIN),
                    Object::Integer(PAGE_HEIGHT - MARGIN - FONT_SIZE),
                ],
            ),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            if !line.is_empty() {
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(to_win_ansi(line))],
                ));
            }
        }
        ops.push(Operation::new("ET", vec![]));
        pdf.add_page(ops, resources.clone(), PAGE_WIDTH, PAGE_HEIGHT)?;
    }

    debug!("Laid out {} text pages", pages.len());
    pdf.finish()
}

/// Wrap each raster as one full-bleed page.
pub fn image_pdf(images: &[RgbImage]) -> Result<Vec<u8>, ConvertError> {
    let mut pdf = PdfBuilder::new();
    for img in images {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            img.as_raw().clone(),
        );
        let image_id = pdf.doc.add_object(xobject);
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        let ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ];
        pdf.add_page(ops, resources, w, h)?;
    }
    pdf.finish()
}

/// Map text onto the WinAnsi code page used by the standard fonts.
/// Characters outside it become `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn add_page(
        &mut self,
        ops: Vec<Operation>,
        resources: Dictionary,
        width: i64,
        height: i64,
    ) -> Result<(), ConvertError> {
        let content = Content { operations: ops }
            .encode()
            .map_err(|e| ConvertError::encoding("PDF content encoding failed", e))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| ConvertError::encoding("PDF write failed", e))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown_text(pdf: &[u8]) -> Vec<Vec<String>> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let raw = doc.get_page_content(id).unwrap();
                Content::decode(&raw)
                    .unwrap()
                    .operations
                    .into_iter()
                    .filter(|op| op.operator == "Tj")
                    .map(|op| String::from_utf8_lossy(op.operands[0].as_str().unwrap()).to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn paragraphs_wrap_at_width() {
        let long = "word ".repeat(40);
        let pages = paginate(&[vec![long]], 20);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].len() > 5);
        assert!(pages[0].iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn overflow_breaks_to_a_new_page() {
        let paragraphs: Vec<String> =
            (0..LINES_PER_PAGE + 3).map(|i| format!("line {i}")).collect();
        let pages = paginate(&[paragraphs], 95);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), LINES_PER_PAGE);
        assert_eq!(pages[1], vec!["line 53", "line 54", "line 55"]);
    }

    #[test]
    fn every_section_gets_its_own_page() {
        let pages = paginate(&[vec!["a".into()], vec![], vec!["c".into()]], 95);
        assert_eq!(pages.len(), 3);
        assert!(pages[1].is_empty());
        assert_eq!(paginate(&[], 95).len(), 1);
    }

    #[test]
    fn text_pdf_draws_the_text() {
        let pdf = text_pdf(
            &[vec!["Hello (world)".into()], vec!["Second slide".into()]],
            95,
        )
        .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        let text = shown_text(&pdf);
        assert_eq!(text, vec![vec!["Hello (world)".to_string()], vec!["Second slide".to_string()]]);
    }

    #[test]
    fn text_pdf_is_deterministic() {
        let sections = vec![vec!["Quarterly report".to_string(), "Revenue grew.".to_string()]];
        assert_eq!(text_pdf(&sections, 95).unwrap(), text_pdf(&sections, 95).unwrap());
    }

    #[test]
    fn image_pdf_page_matches_pixels() {
        let img = RgbImage::from_pixel(120, 80, image::Rgb([200, 10, 10]));
        let pdf = image_pdf(&[img]).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(pages[&1]).unwrap();
        let mediabox = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(mediabox[2].as_i64().unwrap(), 120);
        assert_eq!(mediabox[3].as_i64().unwrap(), 80);
    }

    #[test]
    fn win_ansi_replaces_unmappable() {
        assert_eq!(to_win_ansi("café – ok"), b"caf\xe9 \x96 ok".to_vec());
        assert_eq!(to_win_ansi("日本"), b"??".to_vec());
    }
}
