//! Owned RGBA8 pixel buffers and the pluggable image-file loaders.

use crate::color::Color;
use crate::math::{self, Point2};
use crate::text::Text;
use fxhash::FxHashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Errors from constructing an image in memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageError {
    UnsupportedFormat,
    OutOfMemory,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageError::UnsupportedFormat => f.write_str("unsupported image format"),
            ImageError::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

impl Error for ImageError {}

/// Errors from loading an image from a file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageLoadError {
    FileError,
    UnsupportedFormat,
    OutOfMemory,
}

impl fmt::Display for ImageLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageLoadError::FileError => f.write_str("failed to read image file"),
            ImageLoadError::UnsupportedFormat => f.write_str("unsupported image file format"),
            ImageLoadError::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

impl Error for ImageLoadError {}

impl From<ImageError> for ImageLoadError {
    fn from(error: ImageError) -> ImageLoadError {
        match error {
            ImageError::UnsupportedFormat => ImageLoadError::UnsupportedFormat,
            ImageError::OutOfMemory => ImageLoadError::OutOfMemory,
        }
    }
}

/// RGBA8 pixels, tightly packed, row-major with the first row at the top.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Image {
    dimensions: Point2,
    pixels: Vec<Color>,
}

impl Image {
    /// An image of `dimensions` filled with `fill_color`.
    pub fn solid(dimensions: Point2, fill_color: Color) -> Result<Image, ImageError> {
        let area = checked_area(dimensions)?;

        Ok(Image {
            dimensions,
            pixels: vec![fill_color; area],
        })
    }

    /// Takes ownership of an existing pixel buffer, which must cover
    /// `dimensions` exactly.
    pub fn from_pixels(dimensions: Point2, pixels: Vec<Color>) -> Result<Image, ImageError> {
        if pixels.len() != checked_area(dimensions)? {
            return Err(ImageError::UnsupportedFormat);
        }

        Ok(Image { dimensions, pixels })
    }

    pub fn dimensions(&self) -> Point2 {
        self.dimensions
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// The pixel data viewed as raw RGBA bytes, as the GPU upload wants it.
    pub fn pixel_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self.pixels.as_ptr() as *const u8, self.pixels.len() * 4)
        }
    }

    /// Releases the pixel storage, for handing ownership across the module
    /// ABI.
    pub fn into_boxed_pixels(self) -> Box<[Color]> {
        self.pixels.into_boxed_slice()
    }
}

fn checked_area(dimensions: Point2) -> Result<usize, ImageError> {
    if dimensions.x <= 0 || dimensions.y <= 0 {
        return Err(ImageError::UnsupportedFormat);
    }

    let area = math::area(dimensions);

    if area > isize::max_value() as i64 {
        return Err(ImageError::OutOfMemory);
    }

    Ok(area as usize)
}

/// A pure byte-layout decoder for one image file format.
pub type ImageLoader = fn(&[u8]) -> Result<Image, ImageLoadError>;

lazy_static! {
    static ref IMAGE_LOADERS: Mutex<FxHashMap<Text, ImageLoader>> =
        Mutex::new(FxHashMap::default());
}

/// Registers `loader` for files with the given lowercase extension,
/// replacing any previous registration.
pub fn register_image_loader(file_format: Text, loader: ImageLoader) {
    IMAGE_LOADERS.lock().unwrap().insert(file_format, loader);
}

/// Reads the file at `file_path` and decodes it with the loader registered
/// for its extension.
pub fn load_image(file_path: &Path) -> Result<Image, ImageLoadError> {
    let extension = file_path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| Text::new(&extension.to_ascii_lowercase()))
        .ok_or(ImageLoadError::UnsupportedFormat)?;

    let loader = *IMAGE_LOADERS
        .lock()
        .unwrap()
        .get(&extension)
        .ok_or(ImageLoadError::UnsupportedFormat)?;

    let contents = fs::read(file_path).map_err(|_| ImageLoadError::FileError)?;

    loader(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_fills_every_pixel() {
        let fill = Color::rgb(0xAB, 0xCD, 0xEF);
        let image = Image::solid(Point2::new(3, 2), fill).unwrap();

        assert_eq!(image.dimensions(), Point2::new(3, 2));
        assert_eq!(image.pixels().len(), 6);
        assert!(image.pixels().iter().all(|&pixel| pixel == fill));
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        for dimensions in &[Point2::new(0, 4), Point2::new(4, 0), Point2::new(-1, 1)] {
            assert_eq!(
                Image::solid(*dimensions, Color::BLACK),
                Err(ImageError::UnsupportedFormat)
            );
        }
    }

    #[test]
    fn from_pixels_checks_coverage() {
        let pixels = vec![Color::BLACK; 3];

        assert_eq!(
            Image::from_pixels(Point2::new(2, 2), pixels),
            Err(ImageError::UnsupportedFormat)
        );
    }

    #[test]
    fn pixel_bytes_are_rgba_in_order() {
        let image = Image::solid(Point2::new(1, 1), Color { r: 1, g: 2, b: 3, a: 4 }).unwrap();

        assert_eq!(image.pixel_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert_eq!(
            load_image(Path::new("missing.xyz")),
            Err(ImageLoadError::UnsupportedFormat)
        );
    }
}
