//! Strategy execution.
//!
//! A [`Strategy`] is a plain value: which algorithm runs for a resolved key.
//! [`Strategy::run`] executes it against a staged [`Workspace`] and returns
//! a [`ConversionResult`] or the [`ConvertError`] that ended it.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, rasterising and archive writing are CPU-bound, and pdfium is
//! not async-safe. Every in-process strategy runs on tokio's blocking pool;
//! only the external renderer is awaited directly, since it is a child
//! process with its own timeout. A panic on the blocking pool is caught at
//! the join and reported as a failed conversion.
//!
//! ## Legacy office inputs
//!
//! In-process strategies read Office Open XML only. A `.doc`/`.ppt`
//! compound file is first converted to `.docx`/`.pptx` by the external
//! renderer inside the workspace. External PDF rendering takes the legacy
//! file as-is.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::external::ExternalRenderer;
use crate::format::TargetFormat;
use crate::output::{Artifact, ConversionResult};
use crate::package::{archive_name, single_name};
use crate::pipeline::image::{self as raster, RasterFormat};
use crate::pipeline::ooxml::{self, Block, EmbeddedImage, Slide};
use crate::pipeline::{layout, office, pdf};
use crate::workspace::Workspace;
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Word/PowerPoint → PDF implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Renderer {
    /// High-fidelity render by the external office suite.
    External,
    /// In-process text layout.
    Structural,
}

/// One conversion algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ImageToRaster(RasterFormat),
    ImageToPdf,
    ImageToWord,
    ImageToPresentation,
    PdfToRaster(RasterFormat),
    PdfToWord,
    PdfToPresentation,
    WordToPdf(Renderer),
    WordToPresentation,
    WordPassthrough,
    PresentationToPdf(Renderer),
    PresentationToWord,
    PresentationPassthrough,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::ImageToRaster(_) => "image-transcode",
            Strategy::ImageToPdf => "image-to-pdf",
            Strategy::ImageToWord => "image-to-word",
            Strategy::ImageToPresentation => "image-to-presentation",
            Strategy::PdfToRaster(_) => "pdf-rasterize",
            Strategy::PdfToWord => "pdf-to-word",
            Strategy::PdfToPresentation => "pdf-to-presentation",
            Strategy::WordToPdf(Renderer::External) => "word-to-pdf (external)",
            Strategy::WordToPdf(Renderer::Structural) => "word-to-pdf (structural)",
            Strategy::WordToPresentation => "word-to-presentation",
            Strategy::WordPassthrough => "word-passthrough",
            Strategy::PresentationToPdf(Renderer::External) => "presentation-to-pdf (external)",
            Strategy::PresentationToPdf(Renderer::Structural) => "presentation-to-pdf (structural)",
            Strategy::PresentationToWord => "presentation-to-word",
            Strategy::PresentationPassthrough => "presentation-passthrough",
        };
        f.write_str(name)
    }
}

/// Per-request parameters a strategy needs, owned so they can cross onto
/// the blocking pool.
#[derive(Debug, Clone)]
pub struct Job {
    pub basename: String,
    pub target: TargetFormat,
    pub jpeg_quality: u8,
    pub raster: pdf::RasterOptions,
    pub max_title_chars: usize,
    pub max_line_chars: usize,
    pub pdfium_library_path: Option<PathBuf>,
}

impl Job {
    pub fn new(config: &ConverterConfig, basename: &str, target: &TargetFormat) -> Self {
        Self {
            basename: basename.to_string(),
            target: target.clone(),
            jpeg_quality: config.jpeg_quality,
            raster: pdf::RasterOptions {
                dpi: config.dpi,
                max_pixels: config.max_rendered_pixels,
            },
            max_title_chars: config.max_title_chars,
            max_line_chars: config.max_line_chars,
            pdfium_library_path: config.pdfium_library_path.clone(),
        }
    }

    fn single(&self, bytes: Vec<u8>) -> ConversionResult {
        ConversionResult::Single {
            bytes,
            filename: single_name(&self.basename, &self.target),
            mime_type: self.target.mime_type().to_string(),
        }
    }
}

impl Strategy {
    /// Execute against the staged upload in `workspace`.
    pub async fn run(
        self,
        workspace: &Workspace,
        job: Job,
        renderer: &ExternalRenderer,
    ) -> Result<ConversionResult, ConvertError> {
        match self {
            Strategy::WordToPdf(Renderer::External)
            | Strategy::PresentationToPdf(Renderer::External) => {
                let out_dir = workspace.scratch_dir("render")?;
                let produced = renderer.render_to_pdf(workspace.input(), &out_dir).await?;
                let bytes = read_staged(&produced).await?;
                Ok(job.single(bytes))
            }

            Strategy::ImageToRaster(_)
            | Strategy::ImageToPdf
            | Strategy::ImageToWord
            | Strategy::ImageToPresentation
            | Strategy::PdfToRaster(_)
            | Strategy::PdfToWord
            | Strategy::PdfToPresentation => {
                let bytes = read_staged(workspace.input()).await?;
                blocking(move || self.run_in_process(bytes, &job)).await
            }

            Strategy::WordToPdf(Renderer::Structural)
            | Strategy::WordToPresentation
            | Strategy::WordPassthrough => {
                let bytes = open_xml_input(workspace, renderer, "docx").await?;
                blocking(move || self.run_in_process(bytes, &job)).await
            }

            Strategy::PresentationToPdf(Renderer::Structural)
            | Strategy::PresentationToWord
            | Strategy::PresentationPassthrough => {
                let bytes = open_xml_input(workspace, renderer, "pptx").await?;
                blocking(move || self.run_in_process(bytes, &job)).await
            }
        }
    }

    /// The in-process algorithms. Blocking.
    pub fn run_in_process(
        self,
        bytes: Vec<u8>,
        job: &Job,
    ) -> Result<ConversionResult, ConvertError> {
        match self {
            Strategy::ImageToRaster(format) => {
                let out = raster::transcode(&bytes, format, job.jpeg_quality)?;
                Ok(job.single(out))
            }
            Strategy::ImageToPdf => {
                let img = raster::decode(&bytes)?;
                let rgb = raster::flatten_on_white(&img);
                Ok(job.single(layout::image_pdf(&[rgb])?))
            }
            Strategy::ImageToWord => {
                let embedded = embeddable(bytes)?;
                Ok(job.single(ooxml::write_docx(&[Block::Image(embedded)])?))
            }
            Strategy::ImageToPresentation => {
                let slide = Slide {
                    image: Some(embeddable(bytes)?),
                    ..Default::default()
                };
                Ok(job.single(ooxml::write_pptx(&[slide])?))
            }
            Strategy::PdfToRaster(format) => pdf_to_raster(&bytes, format, job),
            Strategy::PdfToWord => {
                let pdfium = pdf::bind(job.pdfium_library_path.as_deref())?;
                let pages = pdf::page_texts(&pdfium, &bytes)?;
                Ok(job.single(ooxml::write_docx(&pdf_pages_to_blocks(&pages))?))
            }
            Strategy::PdfToPresentation => {
                let pdfium = pdf::bind(job.pdfium_library_path.as_deref())?;
                let slides: Vec<Slide> = pdf::page_texts(&pdfium, &bytes)?
                    .iter()
                    .map(|page| Slide {
                        body: pdf::text_lines(page),
                        ..Default::default()
                    })
                    .collect();
                Ok(job.single(ooxml::write_pptx(&slides)?))
            }
            Strategy::WordToPdf(_) => {
                let paragraphs = office::read_docx(&bytes)?;
                Ok(job.single(layout::text_pdf(&[paragraphs], job.max_line_chars)?))
            }
            Strategy::WordToPresentation => {
                let paragraphs = office::read_docx(&bytes)?;
                let slides = paragraphs_to_slides(&paragraphs, job.max_title_chars);
                debug!("{} paragraphs → {} slides", paragraphs.len(), slides.len());
                Ok(job.single(ooxml::write_pptx(&slides)?))
            }
            Strategy::WordPassthrough => {
                Ok(job.single(office::repackage(&bytes, office::DOCX_MAIN_PART)?))
            }
            Strategy::PresentationToPdf(_) => {
                let sections: Vec<Vec<String>> = office::read_pptx(&bytes)?
                    .iter()
                    .map(|shapes| {
                        shapes.iter().flat_map(|s| s.lines()).map(str::to_string).collect()
                    })
                    .collect();
                Ok(job.single(layout::text_pdf(&sections, job.max_line_chars)?))
            }
            Strategy::PresentationToWord => {
                let blocks: Vec<Block> = office::read_pptx(&bytes)?
                    .into_iter()
                    .flatten()
                    .map(Block::Paragraph)
                    .collect();
                Ok(job.single(ooxml::write_docx(&blocks)?))
            }
            Strategy::PresentationPassthrough => {
                Ok(job.single(office::repackage(&bytes, office::PPTX_MAIN_PART)?))
            }
        }
    }
}

async fn read_staged(path: &Path) -> Result<Vec<u8>, ConvertError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ConvertError::unreadable("staged file unreadable", e))
}

/// Run `f` on the blocking pool, folding a panic into a failure.
async fn blocking<T, F>(f: F) -> Result<T, ConvertError>
where
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        warn!("Conversion task did not complete: {}", e);
        ConvertError::EncodingFailed("conversion aborted unexpectedly".into())
    })?
}

/// Staged office bytes as Office Open XML, normalising a legacy binary
/// file through the renderer first.
async fn open_xml_input(
    workspace: &Workspace,
    renderer: &ExternalRenderer,
    modern_ext: &str,
) -> Result<Vec<u8>, ConvertError> {
    let bytes = read_staged(workspace.input()).await?;
    match office::sniff(&bytes)? {
        office::Container::OpenXml => Ok(bytes),
        office::Container::LegacyBinary => {
            warn!(
                request = %workspace.id(),
                "Legacy binary input; normalizing to .{} via {}",
                modern_ext,
                renderer.program()
            );
            let out_dir = workspace.scratch_dir("normalize")?;
            let produced = renderer
                .convert_to(workspace.input(), &out_dir, modern_ext)
                .await?;
            read_staged(&produced).await
        }
    }
}

fn embeddable(bytes: Vec<u8>) -> Result<EmbeddedImage, ConvertError> {
    let img = raster::decode(&bytes)?;
    let (width_px, height_px) = (img.width(), img.height());
    match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => Ok(EmbeddedImage {
            bytes,
            extension: "png",
            width_px,
            height_px,
        }),
        Ok(image::ImageFormat::Jpeg) => Ok(EmbeddedImage {
            bytes,
            extension: "jpeg",
            width_px,
            height_px,
        }),
        _ => Ok(EmbeddedImage {
            bytes: raster::encode(&img, RasterFormat::Png, 90)?,
            extension: "png",
            width_px,
            height_px,
        }),
    }
}

fn pdf_to_raster(
    bytes: &[u8],
    format: RasterFormat,
    job: &Job,
) -> Result<ConversionResult, ConvertError> {
    let pdfium = pdf::bind(job.pdfium_library_path.as_deref())?;
    let pages = pdf::rasterize(&pdfium, bytes, job.raster)?;
    pages_to_result(pages, format, job)
}

/// Encode rendered pages: one page is a single file named like the target,
/// more become `<basename>_page_<n>.<ext>` entries of one archive.
fn pages_to_result(
    pages: Vec<DynamicImage>,
    format: RasterFormat,
    job: &Job,
) -> Result<ConversionResult, ConvertError> {
    let ext = job.target.file_extension();

    let mut artifacts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        artifacts.push(Artifact {
            bytes: raster::encode(page, format, job.jpeg_quality)?,
            filename: format!("{}_page_{}.{ext}", job.basename, i + 1),
        });
    }

    if artifacts.len() == 1 {
        let only = artifacts.remove(0);
        return Ok(ConversionResult::Single {
            bytes: only.bytes,
            filename: single_name(&job.basename, &job.target),
            mime_type: format.mime_type().to_string(),
        });
    }
    Ok(ConversionResult::Multi {
        artifacts,
        archive_name: archive_name(&job.basename, &job.target),
    })
}

/// One paragraph per text line, with a page break between source pages.
fn pdf_pages_to_blocks(pages: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            blocks.push(Block::PageBreak);
        }
        blocks.extend(pdf::text_lines(page).into_iter().map(Block::Paragraph));
    }
    blocks
}

/// One title-only slide per non-empty paragraph. Whitespace runs collapse
/// to one space and titles are cut to `max_title_chars` characters.
fn paragraphs_to_slides(paragraphs: &[String], max_title_chars: usize) -> Vec<Slide> {
    paragraphs
        .iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .map(|p| Slide {
            title: Some(p.chars().take(max_title_chars).collect()),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::io::Cursor;

    fn job(target: TargetFormat) -> Job {
        Job::new(&ConverterConfig::default(), "sample", &target)
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 128])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    fn single_bytes(result: ConversionResult) -> Vec<u8> {
        match result {
            ConversionResult::Single { bytes, .. } => bytes,
            other => panic!("expected single artifact, got {other:?}"),
        }
    }

    #[test]
    fn titles_are_truncated_by_characters() {
        let paragraphs = vec![
            "  ".to_string(),
            "Short".to_string(),
            "é".repeat(150),
            "tab\tand\nbreak".to_string(),
        ];
        let slides = paragraphs_to_slides(&paragraphs, 100);
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].title.as_deref(), Some("Short"));
        assert_eq!(slides[1].title.as_ref().unwrap().chars().count(), 100);
        assert_eq!(slides[2].title.as_deref(), Some("tab and break"));
    }

    fn pages(n: u32) -> Vec<DynamicImage> {
        (1..=n)
            .map(|i| DynamicImage::ImageRgba8(RgbaImage::from_pixel(i, 4, Rgba([9, 9, 9, 255]))))
            .collect()
    }

    #[test]
    fn one_rendered_page_is_a_single_file() {
        let result =
            pages_to_result(pages(1), RasterFormat::Png, &job(TargetFormat::Png)).unwrap();
        match result {
            ConversionResult::Single { bytes, filename, mime_type } => {
                assert_eq!(filename, "sample.png");
                assert_eq!(mime_type, "image/png");
                assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (1, 4));
            }
            other => panic!("expected single artifact, got {other:?}"),
        }
    }

    #[test]
    fn several_rendered_pages_are_archived_in_order() {
        let result =
            pages_to_result(pages(3), RasterFormat::Jpeg, &job(TargetFormat::Jpg)).unwrap();
        let ConversionResult::Multi { artifacts, archive_name } = result else {
            panic!("expected an archive");
        };
        assert_eq!(archive_name, "sample_jpgs.zip");
        let names: Vec<&str> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["sample_page_1.jpg", "sample_page_2.jpg", "sample_page_3.jpg"]);
        let widths: Vec<u32> = artifacts
            .iter()
            .map(|a| image::load_from_memory(&a.bytes).unwrap().width())
            .collect();
        assert_eq!(widths, vec![1, 2, 3]);
    }

    #[test]
    fn page_entries_follow_the_requested_token() {
        let result =
            pages_to_result(pages(2), RasterFormat::Jpeg, &job(TargetFormat::Jpeg)).unwrap();
        let ConversionResult::Multi { artifacts, archive_name } = result else {
            panic!("expected an archive");
        };
        assert_eq!(archive_name, "sample_jpegs.zip");
        assert_eq!(artifacts[0].filename, "sample_page_1.jpeg");

        let single =
            pages_to_result(pages(1), RasterFormat::Jpeg, &job(TargetFormat::Jpeg)).unwrap();
        match single {
            ConversionResult::Single { filename, .. } => assert_eq!(filename, "sample.jpeg"),
            other => panic!("expected single artifact, got {other:?}"),
        }
    }

    #[test]
    fn pdf_pages_are_separated_by_breaks() {
        let blocks = pdf_pages_to_blocks(&["a\nb".into(), "".into(), "c".into()]);
        let shape: Vec<&str> = blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph(p) => p.as_str(),
                Block::PageBreak => "|",
                Block::Image(_) => "img",
            })
            .collect();
        assert_eq!(shape, vec!["a", "b", "|", "|", "c"]);
    }

    #[test]
    fn image_to_pdf_keeps_pixel_size() {
        let out = single_bytes(
            Strategy::ImageToPdf
                .run_in_process(png(64, 32), &job(TargetFormat::Pdf))
                .unwrap(),
        );
        let doc = lopdf::Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn image_to_word_embeds_original_png() {
        let src = png(10, 10);
        let out = single_bytes(
            Strategy::ImageToWord
                .run_in_process(src.clone(), &job(TargetFormat::Docx))
                .unwrap(),
        );
        let mut archive = zip::ZipArchive::new(Cursor::new(out)).unwrap();
        let mut media = Vec::new();
        let mut entry = archive.by_name("word/media/image1.png").unwrap();
        std::io::Read::read_to_end(&mut entry, &mut media).unwrap();
        assert_eq!(media, src);
    }

    #[test]
    fn jpeg_target_flattens() {
        let out = single_bytes(
            Strategy::ImageToRaster(RasterFormat::Jpeg)
                .run_in_process(png(8, 6), &job(TargetFormat::Jpg))
                .unwrap(),
        );
        let back = image::load_from_memory(&out).unwrap();
        assert_eq!(back.dimensions(), (8, 6));
        assert!(!back.color().has_alpha());
    }

    #[test]
    fn word_to_presentation_round_trips_through_readers() {
        let docx = ooxml::write_docx(&[
            Block::Paragraph("Agenda".into()),
            Block::Paragraph(String::new()),
            Block::Paragraph("Results".into()),
        ])
        .unwrap();
        let out = single_bytes(
            Strategy::WordToPresentation
                .run_in_process(docx, &job(TargetFormat::Pptx))
                .unwrap(),
        );
        let slides = office::read_pptx(&out).unwrap();
        assert_eq!(slides, vec![vec!["Agenda".to_string()], vec!["Results".to_string()]]);
    }

    #[test]
    fn presentation_to_word_keeps_slide_order() {
        let deck = ooxml::write_pptx(&[
            Slide { title: Some("One".into()), body: vec!["detail".into()], ..Default::default() },
            Slide { title: Some("Two".into()), ..Default::default() },
        ])
        .unwrap();
        let out = single_bytes(
            Strategy::PresentationToWord
                .run_in_process(deck, &job(TargetFormat::Docx))
                .unwrap(),
        );
        assert_eq!(office::read_docx(&out).unwrap(), vec!["One", "detail", "Two"]);
    }

    #[test]
    fn structural_deck_pdf_has_one_page_per_slide() {
        let deck =
            ooxml::write_pptx(&[Slide::default(), Slide::default(), Slide::default()]).unwrap();
        let out = single_bytes(
            Strategy::PresentationToPdf(Renderer::Structural)
                .run_in_process(deck, &job(TargetFormat::Pdf))
                .unwrap(),
        );
        assert_eq!(lopdf::Document::load_mem(&out).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn corrupt_office_input_is_unreadable() {
        let err = Strategy::WordToPresentation
            .run_in_process(b"PK\x03\x04garbage".to_vec(), &job(TargetFormat::Pptx))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SourceUnreadable);
    }

    #[test]
    fn display_names_are_distinct() {
        let a = Strategy::WordToPdf(Renderer::External).to_string();
        let b = Strategy::WordToPdf(Renderer::Structural).to_string();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn panics_on_the_blocking_pool_become_failures() {
        let err = blocking::<(), _>(|| panic!("boom")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::EncodingFailed);
        assert!(err.to_string().contains("aborted unexpectedly"));
    }
}
