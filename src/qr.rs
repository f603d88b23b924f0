use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;

use crate::error::Result;

/// Edge length of generated QR images in pixels.
pub const QR_SIZE: u32 = 250;

/// Render `payload` as a PNG QR code with a one-module quiet zone.
///
/// # Returns
/// * PNG bytes, at least [`QR_SIZE`] pixels on each side
pub fn qr_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())?;
    let modules = code.width() as u32 + 2;
    let module_px = (QR_SIZE / modules).max(1);

    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(false)
        .module_dimensions(module_px, module_px)
        .build();
    let framed = add_margin(image, module_px);

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(framed).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// `data:` URI for embedding a QR code in HTML.
pub fn qr_data_uri(payload: &str) -> Result<String> {
    let png = qr_png(payload)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn add_margin(image: image::GrayImage, margin: u32) -> image::GrayImage {
    let size = (image.width() + 2 * margin).max(QR_SIZE);
    let offset_x = (size - image.width()) / 2;
    let offset_y = (size - image.height()) / 2;
    let mut framed = image::GrayImage::from_pixel(size, size, Luma([255u8]));
    image::imageops::overlay(&mut framed, &image, offset_x as i64, offset_y as i64);
    framed
}
