use anyhow::{Context, Result};
use eframe::egui::ColorImage;
use image::imageops::FilterType;

/// Size the metadata card shows thumbnails at
pub const THUMB_WIDTH: u32 = 160;
pub const THUMB_HEIGHT: u32 = 90;

/// Decode raw image bytes and scale them to the card size
pub fn decode_thumbnail(bytes: &[u8]) -> Result<ColorImage> {
    let img = image::load_from_memory(bytes)
        .context("Failed to decode thumbnail")?
        .resize_exact(THUMB_WIDTH, THUMB_HEIGHT, FilterType::Lanczos3)
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}

/// Download and decode the thumbnail URL from the metadata. Blocking; run it
/// off the UI thread.
pub fn fetch_thumbnail(url: &str) -> Result<ColorImage> {
    let resp = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to fetch thumbnail {url}"))?;
    let bytes = resp.bytes().context("Failed to read thumbnail body")?;
    decode_thumbnail(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_and_resizes() {
        let src = image::RgbaImage::from_pixel(32, 32, image::Rgba([200, 10, 10, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(src)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let img = decode_thumbnail(&png).unwrap();
        assert_eq!(img.size, [THUMB_WIDTH as usize, THUMB_HEIGHT as usize]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_thumbnail(b"not an image").is_err());
    }
}
