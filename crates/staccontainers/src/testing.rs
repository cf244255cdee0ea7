//! Fixtures shared by unit tests.

use std::io::Cursor;

use tiff::encoder::colortype::{Gray32Float, RGB32Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

fn geo_keys(epsg: u16) -> Vec<u16> {
    let (model, key) = if epsg == 4326 { (2, 2048) } else { (1, 3072) };
    vec![1, 1, 0, 3, 1024, 0, 1, model, 1025, 0, 1, 1, key, 0, 1, epsg]
}

/// Encodes a single-band float GeoTIFF whose top-left corner is `origin`.
pub fn geotiff_bytes(
    width: u32,
    height: u32,
    values: &[f32],
    origin: (f64, f64),
    resolution: f64,
    epsg: u16,
    nodata: Option<&str>,
) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(width, height).unwrap();
        let dir = image.encoder();
        dir.write_tag(Tag::Unknown(33550), &[resolution, resolution, 0.0][..])
            .unwrap();
        dir.write_tag(
            Tag::Unknown(33922),
            &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
        dir.write_tag(Tag::Unknown(34735), geo_keys(epsg).as_slice())
            .unwrap();
        if let Some(nodata) = nodata {
            dir.write_tag(Tag::Unknown(42113), nodata).unwrap();
        }
        image.write_data(values).unwrap();
    }
    buffer.into_inner()
}

/// Encodes a three-band interleaved float TIFF without georeferencing.
pub fn rgb_geotiff_bytes(width: u32, height: u32, pixels: &[f32]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
        encoder
            .write_image::<RGB32Float>(width, height, pixels)
            .unwrap();
    }
    buffer.into_inner()
}
