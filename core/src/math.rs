//! Scalar, vector and matrix value types.
//!
//! All of these are `#[repr(C)]` because they cross the module ABI and are
//! written verbatim into GPU uniform buffers.

use std::ops::{Add, Div, Mul, Sub};

/// Two signed 32-bit integer components, typically a pixel coordinate or a
/// size in pixels.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Point2 {
    pub x: i32,
    pub y: i32,
}

impl Point2 {
    pub fn new(x: i32, y: i32) -> Point2 {
        Point2 { x, y }
    }
}

/// Number of points covered by a `dimensions` rectangle anchored at the
/// origin. Widened to `i64` so callers can range-check before casting.
pub fn area(dimensions: Point2) -> i64 {
    i64::from(dimensions.x) * i64::from(dimensions.y)
}

macro_rules! impl_vector {
    ($name:ident, $($field:ident),+) => {
        #[repr(C)]
        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl $name {
            pub fn new($($field: f32),+) -> $name {
                $name { $($field),+ }
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, that: $name) -> $name {
                $name { $($field: self.$field + that.$field,)+ }
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, that: $name) -> $name {
                $name { $($field: self.$field - that.$field,)+ }
            }
        }

        impl Mul<f32> for $name {
            type Output = $name;

            fn mul(self, factor: f32) -> $name {
                $name { $($field: self.$field * factor,)+ }
            }
        }

        impl Div<f32> for $name {
            type Output = $name;

            fn div(self, divisor: f32) -> $name {
                $name { $($field: self.$field / divisor,)+ }
            }
        }
    };
}

impl_vector!(Vector2, x, y);
impl_vector!(Vector3, x, y, z);
impl_vector!(Vector4, x, y, z, w);

/// Row-major 4x4 float matrix, laid out exactly as a `layout(row_major)`
/// `mat4x4` uniform expects it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix {
    pub elements: [f32; 16],
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        elements: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Orthographic projection mapping the axis-aligned box delimited by the
    /// six planes onto normalized device coordinates.
    pub fn orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Matrix {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;

        Matrix {
            elements: [
                2.0 / width,
                0.0,
                0.0,
                -(right + left) / width,
                0.0,
                2.0 / height,
                0.0,
                -(top + bottom) / height,
                0.0,
                0.0,
                -2.0 / depth,
                -(far + near) / depth,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }

    /// Applies the matrix to a column vector.
    pub fn transform(&self, v: Vector4) -> Vector4 {
        let e = &self.elements;

        Vector4 {
            x: e[0] * v.x + e[1] * v.y + e[2] * v.z + e[3] * v.w,
            y: e[4] * v.x + e[5] * v.y + e[6] * v.z + e[7] * v.w,
            z: e[8] * v.x + e[9] * v.y + e[10] * v.z + e[11] * v.w,
            w: e[12] * v.x + e[13] * v.y + e[14] * v.z + e[15] * v.w,
        }
    }
}

impl Default for Matrix {
    fn default() -> Matrix {
        Matrix::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_area_widens() {
        assert_eq!(area(Point2::new(4, 8)), 32);
        assert_eq!(
            area(Point2::new(i32::max_value(), i32::max_value())),
            i64::from(i32::max_value()) * i64::from(i32::max_value())
        );
    }

    #[test]
    fn orthographic_maps_corners() {
        // Screen-space projection as used by the sprite dispatcher: origin in
        // the top-left corner, y growing downward.
        let projection = Matrix::orthographic(0.0, 640.0, 480.0, 0.0, -1.0, 1.0);

        let top_left = projection.transform(Vector4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!((top_left.x, top_left.y), (-1.0, 1.0));

        let bottom_right = projection.transform(Vector4::new(640.0, 480.0, 0.0, 1.0));
        assert_eq!((bottom_right.x, bottom_right.y), (1.0, -1.0));
    }

    #[test]
    fn identity_preserves_vectors() {
        let v = Vector4::new(3.0, -2.0, 0.5, 1.0);
        assert_eq!(Matrix::IDENTITY.transform(v), v);
    }
}
