//! Re-encode GSI elevation PNG tiles as Mapbox terrain-RGB.
//!
//! GSI packs elevation into the RGB channels as a signed 24-bit count of
//! centimetres. `0x800000` marks missing data. Terrain-RGB instead stores
//! `round(10 * (metres + 10000))` as an unsigned 24-bit value.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba};

use crate::tileset::TransformError;

const NO_DATA: i32 = -(1 << 23);
const SIGN_BIT: i32 = 1 << 23;
const WRAP: i32 = 1 << 24;
const MAX_ENCODED: i64 = 0x00FF_FFFF;

/// Convert a GSI DEM PNG tile into a terrain-RGB PNG tile.
///
/// Alpha is carried through unchanged. Missing samples encode sea level.
///
/// # Errors
/// Returns [`TransformError`] when the payload is not a decodable PNG or the
/// re-encoded image cannot be written.
pub fn gsi_dem_to_terrain_rgb(bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|err| TransformError::new("decoding PNG", err))?;
    let mut pixels = decoded.to_rgba8();
    for pixel in pixels.pixels_mut() {
        let Rgba([red, green, blue, alpha]) = *pixel;
        let [r, g, b] = encode_terrain_rgb(decode_centimetres(red, green, blue));
        *pixel = Rgba([r, g, b, alpha]);
    }

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|err| TransformError::new("encoding PNG", err))?;
    Ok(encoded.into_inner())
}

/// Signed elevation in centimetres; missing samples read as zero.
fn decode_centimetres(red: u8, green: u8, blue: u8) -> i32 {
    let raw = (i32::from(red) << 16) | (i32::from(green) << 8) | i32::from(blue);
    let signed = if raw >= SIGN_BIT { raw - WRAP } else { raw };
    if signed == NO_DATA { 0 } else { signed }
}

/// `round(10 * (metres + 10000))`, halves rounded up, split into bytes.
fn encode_terrain_rgb(centimetres: i32) -> [u8; 3] {
    let decimetres = (i64::from(centimetres) + 5).div_euclid(10);
    let value = u32::try_from((100_000 + decimetres).clamp(0, MAX_ENCODED)).unwrap_or(0);
    [channel(value, 16), channel(value, 8), channel(value, 0)]
}

fn channel(value: u32, shift: u32) -> u8 {
    u8::try_from((value >> shift) & 0xFF).unwrap_or(u8::MAX)
}
