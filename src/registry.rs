//! Strategy registry: the allow-list of supported conversions.
//!
//! [`TABLE`] is the single place a conversion pair is declared. Adding a
//! pair is one row. Nothing outside the table is ever attempted: a key that
//! does not resolve is reported as unsupported before any file is staged.
//!
//! ## Office → PDF binding
//!
//! Word and PowerPoint → PDF have two implementations. The table marks
//! those rows as [`Binding::OfficePdf`], and [`StrategyRegistry::new`]
//! replaces them with exactly one renderer for the lifetime of the
//! registry:
//!
//! | Policy | Renderer found | Bound strategy |
//! |--------|----------------|----------------|
//! | `Auto` | yes | external |
//! | `Auto` | no  | structural |
//! | `External` | either | external (a missing binary fails per request) |
//! | `Structural` | either | structural |

use crate::config::RendererPolicy;
use crate::format::{normalize_target, ConversionKey, SourceKind};
use crate::pipeline::image::RasterFormat;
use crate::strategy::{Renderer, Strategy};
use std::collections::HashMap;
use tracing::debug;

/// How a table row is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Fixed(Strategy),
    /// Office → PDF; renderer chosen at construction.
    OfficePdf(OfficeFamily),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFamily {
    Word,
    Presentation,
}

use Binding::{Fixed, OfficePdf};
use SourceKind::{Image, PdfDocument, PresentationDocument, WordDocument};

/// Every supported `(source, target token)` pair.
pub const TABLE: &[(SourceKind, &str, Binding)] = &[
    (Image, "png", Fixed(Strategy::ImageToRaster(RasterFormat::Png))),
    (Image, "jpg", Fixed(Strategy::ImageToRaster(RasterFormat::Jpeg))),
    (Image, "jpeg", Fixed(Strategy::ImageToRaster(RasterFormat::Jpeg))),
    (Image, "pdf", Fixed(Strategy::ImageToPdf)),
    (Image, "docx", Fixed(Strategy::ImageToWord)),
    (Image, "doc", Fixed(Strategy::ImageToWord)),
    (Image, "pptx", Fixed(Strategy::ImageToPresentation)),
    (Image, "ppt", Fixed(Strategy::ImageToPresentation)),
    (PdfDocument, "png", Fixed(Strategy::PdfToRaster(RasterFormat::Png))),
    (PdfDocument, "jpg", Fixed(Strategy::PdfToRaster(RasterFormat::Jpeg))),
    (PdfDocument, "jpeg", Fixed(Strategy::PdfToRaster(RasterFormat::Jpeg))),
    (PdfDocument, "docx", Fixed(Strategy::PdfToWord)),
    (PdfDocument, "doc", Fixed(Strategy::PdfToWord)),
    (PdfDocument, "pptx", Fixed(Strategy::PdfToPresentation)),
    (PdfDocument, "ppt", Fixed(Strategy::PdfToPresentation)),
    (WordDocument, "pdf", OfficePdf(OfficeFamily::Word)),
    (WordDocument, "docx", Fixed(Strategy::WordPassthrough)),
    (WordDocument, "doc", Fixed(Strategy::WordPassthrough)),
    (WordDocument, "pptx", Fixed(Strategy::WordToPresentation)),
    (WordDocument, "ppt", Fixed(Strategy::WordToPresentation)),
    (PresentationDocument, "pdf", OfficePdf(OfficeFamily::Presentation)),
    (PresentationDocument, "docx", Fixed(Strategy::PresentationToWord)),
    (PresentationDocument, "doc", Fixed(Strategy::PresentationToWord)),
    (PresentationDocument, "pptx", Fixed(Strategy::PresentationPassthrough)),
    (PresentationDocument, "ppt", Fixed(Strategy::PresentationPassthrough)),
];

/// Resolved, immutable view of [`TABLE`] for one deployment.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<ConversionKey, Strategy>,
    order: Vec<ConversionKey>,
    office_renderer: Renderer,
}

impl StrategyRegistry {
    /// Bind every row. `renderer_available` only matters under
    /// [`RendererPolicy::Auto`].
    pub fn new(policy: RendererPolicy, renderer_available: bool) -> Self {
        let office_renderer = match policy {
            RendererPolicy::Auto if renderer_available => Renderer::External,
            RendererPolicy::Auto | RendererPolicy::Structural => Renderer::Structural,
            RendererPolicy::External => Renderer::External,
        };
        debug!(
            "Binding office → PDF to {:?} renderer (policy {:?})",
            office_renderer, policy
        );

        let mut strategies = HashMap::with_capacity(TABLE.len());
        let mut order = Vec::with_capacity(TABLE.len());
        for &(source, token, binding) in TABLE {
            let strategy = match binding {
                Fixed(s) => s,
                OfficePdf(OfficeFamily::Word) => Strategy::WordToPdf(office_renderer),
                OfficePdf(OfficeFamily::Presentation) => {
                    Strategy::PresentationToPdf(office_renderer)
                }
            };
            let key = ConversionKey::new(source, normalize_target(token));
            order.push(key.clone());
            strategies.insert(key, strategy);
        }

        Self {
            strategies,
            order,
            office_renderer,
        }
    }

    /// Look up the strategy bound to `key`. Pure; `None` means unsupported.
    pub fn resolve(&self, key: &ConversionKey) -> Option<Strategy> {
        self.strategies.get(key).copied()
    }

    /// Every bound key, in table order.
    pub fn supported_pairs(&self) -> &[ConversionKey] {
        &self.order
    }

    /// Which renderer Word/PowerPoint → PDF uses in this registry.
    pub fn office_renderer(&self) -> Renderer {
        self.office_renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TargetFormat;

    const ALL_TOKENS: &[&str] = &["png", "jpg", "jpeg", "pdf", "docx", "doc", "pptx", "ppt"];
    const ALL_SOURCES: &[SourceKind] = &[Image, PdfDocument, WordDocument, PresentationDocument];

    fn supported(source: SourceKind, token: &str) -> bool {
        match source {
            Image => true,
            PdfDocument => token != "pdf",
            WordDocument | PresentationDocument => !matches!(token, "png" | "jpg" | "jpeg"),
        }
    }

    #[test]
    fn table_keys_are_unique() {
        let registry = StrategyRegistry::new(RendererPolicy::Structural, false);
        assert_eq!(registry.supported_pairs().len(), TABLE.len());
        assert_eq!(registry.strategies.len(), TABLE.len());
    }

    #[test]
    fn every_known_pair_resolves_exactly_as_declared() {
        let registry = StrategyRegistry::new(RendererPolicy::Auto, true);
        for &source in ALL_SOURCES {
            for &token in ALL_TOKENS {
                let key = ConversionKey::new(source, normalize_target(token));
                assert_eq!(
                    registry.resolve(&key).is_some(),
                    supported(source, token),
                    "{key}"
                );
            }
        }
    }

    #[test]
    fn unknown_tokens_never_resolve() {
        let registry = StrategyRegistry::new(RendererPolicy::Auto, false);
        for &source in ALL_SOURCES {
            let key = ConversionKey::new(source, TargetFormat::Other("xyz".into()));
            assert!(registry.resolve(&key).is_none());
        }
    }

    #[test]
    fn resolve_is_repeatable() {
        let registry = StrategyRegistry::new(RendererPolicy::Auto, false);
        let key = ConversionKey::new(WordDocument, TargetFormat::Pptx);
        assert_eq!(registry.resolve(&key), registry.resolve(&key));
        assert_eq!(registry.resolve(&key), Some(Strategy::WordToPresentation));
    }

    #[test]
    fn office_pdf_binding_follows_policy() {
        let word_pdf = ConversionKey::new(WordDocument, TargetFormat::Pdf);
        let deck_pdf = ConversionKey::new(PresentationDocument, TargetFormat::Pdf);

        let cases = [
            (RendererPolicy::Auto, true, Renderer::External),
            (RendererPolicy::Auto, false, Renderer::Structural),
            (RendererPolicy::External, false, Renderer::External),
            (RendererPolicy::Structural, true, Renderer::Structural),
        ];
        for (policy, available, expected) in cases {
            let registry = StrategyRegistry::new(policy, available);
            assert_eq!(registry.office_renderer(), expected);
            assert_eq!(registry.resolve(&word_pdf), Some(Strategy::WordToPdf(expected)));
            assert_eq!(
                registry.resolve(&deck_pdf),
                Some(Strategy::PresentationToPdf(expected))
            );
        }
    }

    #[test]
    fn legacy_tokens_share_strategies_with_modern_ones() {
        let registry = StrategyRegistry::new(RendererPolicy::Auto, false);
        let pairs = [
            (TargetFormat::Doc, TargetFormat::Docx),
            (TargetFormat::Ppt, TargetFormat::Pptx),
            (TargetFormat::Jpg, TargetFormat::Jpeg),
        ];
        for (legacy, modern) in pairs {
            for &source in ALL_SOURCES {
                assert_eq!(
                    registry.resolve(&ConversionKey::new(source, legacy.clone())),
                    registry.resolve(&ConversionKey::new(source, modern.clone())),
                );
            }
        }
    }
}
