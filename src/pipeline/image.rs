//! Raster transcoding: decode, flatten, re-encode.
//!
//! JPEG and PDF image pages have no alpha channel, so any transparency is
//! composited onto opaque white first. Palette images are expanded to
//! RGB/RGBA by the decoder, which makes `has_alpha()` the only check needed.
//! Dimensions are never changed here.

use crate::error::ConvertError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Raster output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn supports_alpha(self) -> bool {
        matches!(self, RasterFormat::Png)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Decode image bytes of any enabled format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ConvertError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConvertError::unreadable("image decode failed", e))?;
    debug!(
        "Decoded {}x{} image ({:?})",
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img)
}

/// Composite `img` onto opaque white, producing RGB8.
///
/// Images without alpha are converted without blending.
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Encode `img` as `format`, flattening first when the format lacks alpha.
pub fn encode(
    img: &DynamicImage,
    format: RasterFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Vec::new();
    match format {
        RasterFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| ConvertError::encoding("PNG encode failed", e))?;
        }
        RasterFormat::Jpeg => {
            let rgb = flatten_on_white(img);
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality)
                .encode_image(&rgb)
                .map_err(|e| ConvertError::encoding("JPEG encode failed", e))?;
        }
    }
    debug!("Encoded {:?} → {} bytes", format, buf.len());
    Ok(buf)
}

/// Re-encode image bytes as `format`.
pub fn transcode(
    bytes: &[u8],
    format: RasterFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, ConvertError> {
    let img = decode(bytes)?;
    encode(&img, format, jpeg_quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn transparent_pixels_become_white() {
        let mut rgba = RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        let flat = flatten_on_white(&DynamicImage::ImageRgba8(rgba));

        assert_eq!(flat.dimensions(), (4, 3));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(flat.get_pixel(2, 2).0, [255, 255, 255]);
        let half = flat.get_pixel(1, 0).0;
        assert!(half[0] > 120 && half[0] < 135, "got {half:?}");
    }

    #[test]
    fn png_with_alpha_to_jpeg_keeps_dimensions() {
        let rgba = RgbaImage::from_pixel(17, 9, Rgba([10, 200, 30, 0]));
        let src = png_bytes(&DynamicImage::ImageRgba8(rgba));
        let jpeg = transcode(&src, RasterFormat::Jpeg, 90).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(back.dimensions(), (17, 9));
        assert!(!back.color().has_alpha());
        // Fully transparent source → (near) white after lossy encode.
        let px = back.to_rgb8().get_pixel(8, 4).0;
        assert!(px.iter().all(|&c| c > 240), "got {px:?}");
    }

    #[test]
    fn png_target_preserves_alpha() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 77]));
        let src = png_bytes(&DynamicImage::ImageRgba8(rgba));
        let out = transcode(&src, RasterFormat::Png, 90).unwrap();
        let back = image::load_from_memory(&out).unwrap();
        assert!(back.color().has_alpha());
        assert_eq!(back.to_rgba8().get_pixel(1, 1).0, [1, 2, 3, 77]);
    }

    #[test]
    fn transcode_is_deterministic() {
        let rgba = RgbaImage::from_fn(32, 32, |x, y| Rgba([x as u8 * 8, y as u8 * 8, 90, 200]));
        let src = png_bytes(&DynamicImage::ImageRgba8(rgba));
        let a = transcode(&src, RasterFormat::Jpeg, 85).unwrap();
        let b = transcode(&src, RasterFormat::Jpeg, 85).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_is_source_unreadable() {
        let err = transcode(b"definitely not an image", RasterFormat::Png, 90).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SourceUnreadable);
    }
}
