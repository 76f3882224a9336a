//! Image and EXIF builders shared by unit tests.

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use std::io::Cursor;

/// Encode an 8x8 grid as PNG; `pattern` is 64 `0`/`1` characters, row-major
pub fn pattern_png(pattern: &str) -> Vec<u8> {
    let bits: Vec<bool> = pattern.chars().map(|c| c == '1').collect();
    assert_eq!(bits.len(), 64, "pattern must have 64 cells");

    let img = ImageBuffer::from_fn(8, 8, |x, y| {
        Luma([if bits[(y * 8 + x) as usize] { 255u8 } else { 0u8 }])
    });
    encode(&DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

/// A fixed 64-cell pattern with a mix of bright and dark cells
pub fn base_pattern() -> String {
    (0..64)
        .map(|i| if (i * 7 + i / 8) % 3 == 0 { '1' } else { '0' })
        .collect()
}

/// Flip the first `count` cells of a pattern
pub fn flip_cells(pattern: &str, count: usize) -> String {
    pattern
        .chars()
        .enumerate()
        .map(|(i, c)| match (i < count, c) {
            (true, '1') => '0',
            (true, _) => '1',
            (false, c) => c,
        })
        .collect()
}

/// A small gradient JPEG; `seed` varies the content
pub fn plain_jpeg(seed: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(32, 32, |x, y| {
        Rgb([
            (x * 8) as u8,
            (y * 8) as u8,
            seed.wrapping_mul(37),
        ])
    });
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, format)
        .expect("encoding a test image");
    bytes.into_inner()
}

/// Fields to embed in a test JPEG
#[derive(Debug, Clone, Default)]
pub struct ExifFields {
    pub capture_time: Option<&'static str>,
    pub digitized_time: Option<&'static str>,
    pub modified_time: Option<&'static str>,
    pub latitude: Option<([u32; 3], &'static str)>,
    pub longitude: Option<([u32; 3], &'static str)>,
}

/// A JPEG carrying the given EXIF fields in an APP1 segment
pub fn jpeg_with_exif(wanted: &ExifFields) -> Vec<u8> {
    splice_exif(&plain_jpeg(11), &exif_tiff(wanted))
}

fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

fn dms(tag: Tag, parts: [u32; 3]) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(
            parts
                .iter()
                .map(|&num| Rational { num, denom: 1 })
                .collect(),
        ),
    }
}

fn exif_tiff(wanted: &ExifFields) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(text) = wanted.capture_time {
        fields.push(ascii(Tag::DateTimeOriginal, text));
    }
    if let Some(text) = wanted.digitized_time {
        fields.push(ascii(Tag::DateTimeDigitized, text));
    }
    if let Some(text) = wanted.modified_time {
        fields.push(ascii(Tag::DateTime, text));
    }
    if let Some((parts, reference)) = wanted.latitude {
        fields.push(dms(Tag::GPSLatitude, parts));
        fields.push(ascii(Tag::GPSLatitudeRef, reference));
    }
    if let Some((parts, reference)) = wanted.longitude {
        fields.push(dms(Tag::GPSLongitude, parts));
        fields.push(ascii(Tag::GPSLongitudeRef, reference));
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).expect("writing test EXIF");
    buf.into_inner()
}

/// Insert a TIFF payload as an APP1 segment right after the JPEG SOI marker
fn splice_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    let length = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}
