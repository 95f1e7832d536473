//! Value types and pure services shared by every layer of the engine:
//! math primitives, colors, images and their decoders, and the cheap-to-clone
//! immutable [`Text`](text::Text) string.

#[macro_use]
extern crate lazy_static;

pub mod bitmap;
pub mod color;
pub mod image;
pub mod math;
pub mod text;

pub use self::color::Color;
pub use self::image::{Image, ImageError, ImageLoadError};
pub use self::math::{Matrix, Point2, Vector2, Vector3, Vector4};
pub use self::text::Text;
