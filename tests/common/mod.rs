//! Helpers shared by the integration tests.

#![allow(dead_code)]

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use fishlog::core::catalog::{Catalog, LibraryLayout};
use fishlog::core::pipeline::IngestPipeline;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use std::io::Cursor;
use tempfile::TempDir;

/// A library in a temporary directory
pub struct TestLibrary {
    pub dir: TempDir,
    pub layout: LibraryLayout,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = LibraryLayout::new(dir.path().join("library"));
        Self { dir, layout }
    }

    pub fn catalog(&self) -> Catalog {
        self.layout.open().unwrap()
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::builder()
            .blob_store(self.layout.blob_store())
            .build()
            .unwrap()
    }
}

/// Encode an 8x8 grid as PNG; `pattern` is 64 `0`/`1` characters
pub fn pattern_png(pattern: &str) -> Vec<u8> {
    let bits: Vec<bool> = pattern.chars().map(|c| c == '1').collect();
    assert_eq!(bits.len(), 64);
    let img = ImageBuffer::from_fn(8, 8, |x, y| {
        Luma([if bits[(y * 8 + x) as usize] { 255u8 } else { 0u8 }])
    });
    encode(&DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

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

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

/// A JPEG whose EXIF says it was taken at `capture_time`, optionally with a position
pub fn jpeg_taken_at(capture_time: &str, gps: Option<(u32, &str, u32, &str)>) -> Vec<u8> {
    let ascii = |tag, text: &str| Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    };
    let degrees = |tag, deg: u32| Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(vec![
            Rational { num: deg, denom: 1 },
            Rational { num: 0, denom: 1 },
            Rational { num: 0, denom: 1 },
        ]),
    };

    let mut fields = vec![ascii(Tag::DateTimeOriginal, capture_time)];
    if let Some((lat, lat_ref, lon, lon_ref)) = gps {
        fields.push(degrees(Tag::GPSLatitude, lat));
        fields.push(ascii(Tag::GPSLatitudeRef, lat_ref));
        fields.push(degrees(Tag::GPSLongitude, lon));
        fields.push(ascii(Tag::GPSLongitudeRef, lon_ref));
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let img = ImageBuffer::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 90]));
    let jpeg = encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

    let length = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::new();
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}
