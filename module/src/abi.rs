//! C-compatible types shared with game modules.
//!
//! Everything here mirrors the declarations a module sees in its own
//! language; field names follow the C header rather than Rust convention.

#![allow(non_snake_case)]

use ona_core::color::Color;
use ona_core::math::{Point2, Vector3};
use std::os::raw::{c_char, c_void};

pub use ona_graphics::events::KEY_COUNT;

/// Per-frame events record; identical layout to the host's events type.
pub type OnaEvents = ona_graphics::Events;

/// USB HID usage indices for the letter keys.
pub const KEY_A: usize = 0x04;
pub const KEY_B: usize = 0x05;
pub const KEY_C: usize = 0x06;
pub const KEY_D: usize = 0x07;
pub const KEY_E: usize = 0x08;
pub const KEY_F: usize = 0x09;
pub const KEY_G: usize = 0x0A;
pub const KEY_H: usize = 0x0B;
pub const KEY_I: usize = 0x0C;
pub const KEY_J: usize = 0x0D;
pub const KEY_K: usize = 0x0E;
pub const KEY_L: usize = 0x0F;
pub const KEY_M: usize = 0x10;
pub const KEY_N: usize = 0x11;
pub const KEY_O: usize = 0x12;
pub const KEY_P: usize = 0x13;
pub const KEY_Q: usize = 0x14;
pub const KEY_R: usize = 0x15;
pub const KEY_S: usize = 0x16;
pub const KEY_T: usize = 0x17;
pub const KEY_U: usize = 0x18;
pub const KEY_V: usize = 0x19;
pub const KEY_W: usize = 0x1A;
pub const KEY_X: usize = 0x1B;
pub const KEY_Y: usize = 0x1C;
pub const KEY_Z: usize = 0x1D;

/// Opaque handle to the host's allocator.
#[repr(C)]
pub struct OnaAllocator {
    _opaque: [u8; 0],
}

/// Opaque handle to a thread-local graphics queue.
#[repr(C)]
pub struct OnaGraphicsQueue {
    _opaque: [u8; 0],
}

/// Opaque handle to a sprite material.
#[repr(C)]
pub struct OnaMaterial {
    _opaque: [u8; 0],
}

/// Opaque handle to a rendezvous channel.
#[repr(C)]
pub struct OnaChannel {
    _opaque: [u8; 0],
}

/// Opaque string value; storage for the host's text representation.
#[repr(C)]
pub struct OnaString {
    pub userdata: [u8; 32],
}

/// An image whose pixel storage is owned by a host allocator. Release with
/// [`OnaContext::imageFree`].
#[repr(C)]
pub struct OnaImage {
    pub allocator: *mut OnaAllocator,
    pub pixels: *mut Color,
    pub dimensions: Point2,
}

/// One sprite draw request: where to draw and with what tint.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct OnaSprite {
    pub origin: Vector3,
    pub tint: Color,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OnaImageError {
    None = 0,
    UnsupportedFormat = 1,
    OutOfMemory = 2,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OnaImageLoadError {
    None = 0,
    FileError = 1,
    UnsupportedFormat = 2,
    OutOfMemory = 3,
}

pub type SystemInitializer = Option<unsafe extern "C" fn(*mut c_void, *const OnaContext)>;

pub type SystemProcessor =
    Option<unsafe extern "C" fn(*mut c_void, *const OnaContext, *const OnaEvents)>;

pub type SystemFinalizer = Option<unsafe extern "C" fn(*mut c_void, *const OnaContext)>;

/// Descriptor for one system spawned by a module during `OnaInit`. The host
/// zero-allocates `size` bytes of userdata and passes it to each callback.
#[repr(C)]
pub struct SystemInfo {
    pub size: u32,
    pub init: SystemInitializer,
    pub process: SystemProcessor,
    pub finalize: SystemFinalizer,
}

/// The host services vtable. A single `const` instance is shared with every
/// module; all functions are stateless dispatchers onto host services.
#[repr(C)]
pub struct OnaContext {
    pub spawnSystem: unsafe extern "C" fn(systemInfo: *const SystemInfo) -> bool,

    pub defaultAllocator: unsafe extern "C" fn() -> *mut OnaAllocator,

    pub graphicsQueueAcquire: unsafe extern "C" fn() -> *mut OnaGraphicsQueue,

    pub imageSolid: unsafe extern "C" fn(
        allocator: *mut OnaAllocator,
        dimensions: Point2,
        fillColor: Color,
        imageResult: *mut OnaImage,
    ) -> OnaImageError,

    pub imageLoad: unsafe extern "C" fn(
        allocator: *mut OnaAllocator,
        filePath: *const c_char,
        imageResult: *mut OnaImage,
    ) -> OnaImageLoadError,

    pub imageFree: unsafe extern "C" fn(image: *mut OnaImage),

    pub materialCreate: unsafe extern "C" fn(materialImage: *const OnaImage) -> *mut OnaMaterial,

    pub materialFree: unsafe extern "C" fn(material: *mut *mut OnaMaterial),

    pub renderSprite: unsafe extern "C" fn(
        graphicsQueue: *mut OnaGraphicsQueue,
        spriteMaterial: *mut OnaMaterial,
        sprite: *const OnaSprite,
    ),

    pub channelOpen: unsafe extern "C" fn(typeSize: u32) -> *mut OnaChannel,

    pub channelClose: unsafe extern "C" fn(channel: *mut *mut OnaChannel),

    pub channelSend: unsafe extern "C" fn(
        channel: *mut OnaChannel,
        inputBufferLength: usize,
        inputBufferPointer: *const c_void,
    ) -> u32,

    pub channelReceive: unsafe extern "C" fn(
        channel: *mut OnaChannel,
        outputBufferLength: usize,
        outputBufferPointer: *mut c_void,
    ) -> u32,
}
