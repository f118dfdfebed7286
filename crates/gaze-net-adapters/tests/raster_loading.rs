//! Integration tests for raster image loading.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gaze_net_adapters::FsImageSource;
use gaze_net_core::{ImageInfo, ImageSource};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

const FORMATS: &[(&str, ImageFormat)] = &[
    ("test.jpg", ImageFormat::Jpeg),
    ("test.png", ImageFormat::Png),
    ("test.tiff", ImageFormat::Tiff),
    ("test.bmp", ImageFormat::Bmp),
    ("test.gif", ImageFormat::Gif),
];

fn write_fixture(dir: &Path, name: &str, format: ImageFormat) {
    let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 32) as u8, (y * 32) as u8, 128]));
    DynamicImage::ImageRgb8(img)
        .save_with_format(dir.join(name), format)
        .expect("fixture should encode");
}

fn fixtures_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, format) in FORMATS {
        write_fixture(dir.path(), name, *format);
    }
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    dir
}

fn load_single(path: &Path) -> ImageInfo {
    let source = FsImageSource::new(vec![path.to_path_buf()], false);
    let images: Vec<_> = source.images().collect();
    assert_eq!(images.len(), 1);
    images.into_iter().next().unwrap().expect("should load")
}

#[test]
fn test_load_each_format() {
    let dir = fixtures_dir();
    for (name, _) in FORMATS {
        let info = load_single(&dir.path().join(name));
        assert_eq!(info.width, 8, "{name}");
        assert_eq!(info.height, 8, "{name}");
        assert!(info.path.ends_with(name));
    }
}

#[test]
fn test_load_directory_skips_unsupported() {
    let dir = fixtures_dir();
    let source = FsImageSource::new(vec![dir.path().to_path_buf()], false);

    let images: Vec<_> = source.images().collect();
    assert_eq!(images.len(), FORMATS.len());

    for result in images {
        let info: ImageInfo = result.expect("all fixtures should load");
        assert_eq!((info.width, info.height), (8, 8));
    }
}

#[test]
fn test_directory_order_is_sorted() {
    let dir = fixtures_dir();
    let source = FsImageSource::new(vec![dir.path().to_path_buf()], false);

    let names: Vec<String> = source
        .images()
        .map(|r| r.unwrap().path)
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_recursive_flag() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    write_fixture(dir.path(), "top.png", ImageFormat::Png);
    write_fixture(&nested, "deep.png", ImageFormat::Png);

    let flat = FsImageSource::new(vec![dir.path().to_path_buf()], false);
    assert_eq!(flat.count_hint(), Some(1));

    let recursive = FsImageSource::new(vec![dir.path().to_path_buf()], true);
    assert_eq!(recursive.count_hint(), Some(2));
}

#[test]
fn test_corrupt_image_is_an_item_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"definitely not a png").unwrap();

    let source = FsImageSource::new(vec![path], false);
    let images: Vec<_> = source.images().collect();
    assert_eq!(images.len(), 1);
    let err = images.into_iter().next().unwrap().unwrap_err();
    assert!(err.to_string().contains("Failed to open image"));
}

#[test]
fn test_missing_path_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = FsImageSource::new(vec![dir.path().join("nope.jpg")], false);
    assert_eq!(source.count_hint(), Some(0));
}
