//! Per-format conversion stages.
//!
//! Each submodule reads or writes exactly one family of formats. The
//! strategies in [`crate::strategy`] compose them; none of these stages
//! knows about requests, workspaces or the registry.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ image  ──▶ raster bytes / RGB pixels
//! source ────┼──▶ pdf    ──▶ page bitmaps / page text       (pdfium)
//!  bytes     └──▶ office ──▶ paragraphs / slide shape text  (zip + quick-xml)
//!
//! pixels / text ──┬──▶ layout ──▶ PDF                       (lopdf)
//!                 └──▶ ooxml  ──▶ .docx / .pptx             (zip)
//! ```
//!
//! 1. [`image`]  — decode, alpha-flatten onto white, re-encode PNG/JPEG
//! 2. [`pdf`]    — bind pdfium, rasterise every page, extract page text
//! 3. [`office`] — sniff container, read paragraphs and slide text,
//!    re-serialize a container unchanged
//! 4. [`layout`] — write image pages and wrapped text pages as PDF
//! 5. [`ooxml`]  — write minimal Word documents and slide decks

pub mod image;
pub mod layout;
pub mod office;
pub mod ooxml;
pub mod pdf;
