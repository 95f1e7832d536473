//! The host services vtable shared with every module.
//!
//! Each entry is a stateless `extern "C"` dispatcher onto the corresponding
//! host service. The graphics server is published here for the duration of
//! the host loop; material and image creation are main-thread-only, so the
//! pointer is only ever dereferenced on the thread that owns the server.

use crate::abi::*;
use crate::runtime::{self, SystemRecord};
use ona_core::color::Color;
use ona_core::image::{self, Image, ImageError, ImageLoadError};
use ona_core::math::{self, Point2, Vector2};
use ona_graphics::queue::{self, GraphicsQueue, Sprite};
use ona_graphics::{sprite, GraphicsServer};
use ona_tasks::Channel;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;

static GRAPHICS_SERVER: AtomicPtr<GraphicsServer> = AtomicPtr::new(ptr::null_mut());

/// Makes `server` reachable from the vtable for the duration of the host
/// loop. Main thread only.
pub fn publish_graphics_server(server: &mut GraphicsServer) {
    GRAPHICS_SERVER.store(server, Ordering::SeqCst);
}

/// Severs the vtable's access to the graphics server, before it is dropped.
pub fn retract_graphics_server() {
    GRAPHICS_SERVER.store(ptr::null_mut(), Ordering::SeqCst);
}

unsafe fn graphics_server<'a>() -> Option<&'a mut GraphicsServer> {
    let server = GRAPHICS_SERVER.load(Ordering::SeqCst);

    if server.is_null() {
        None
    } else {
        Some(&mut *server)
    }
}

static DEFAULT_ALLOCATOR_TAG: u8 = 0;

fn default_allocator_ptr() -> *mut OnaAllocator {
    &DEFAULT_ALLOCATOR_TAG as *const u8 as *mut OnaAllocator
}

/// Moves `image`'s pixel storage out to the ABI representation.
unsafe fn leak_image(image: Image, result: *mut OnaImage) {
    let dimensions = image.dimensions();
    let pixels = Box::into_raw(image.into_boxed_pixels()) as *mut Color;

    *result = OnaImage {
        allocator: default_allocator_ptr(),
        pixels,
        dimensions,
    };
}

unsafe extern "C" fn spawn_system(system_info: *const SystemInfo) -> bool {
    if system_info.is_null() {
        return false;
    }

    runtime::push_pending_system(SystemRecord::new(&*system_info));

    true
}

unsafe extern "C" fn default_allocator() -> *mut OnaAllocator {
    default_allocator_ptr()
}

unsafe extern "C" fn graphics_queue_acquire() -> *mut OnaGraphicsQueue {
    let queue = queue::acquire_queue();

    // The registry keeps the queue alive for the rest of the process, so the
    // raw pointer stays valid.
    &*queue as *const Mutex<GraphicsQueue> as *mut OnaGraphicsQueue
}

unsafe extern "C" fn image_solid(
    _allocator: *mut OnaAllocator,
    dimensions: Point2,
    fill_color: Color,
    image_result: *mut OnaImage,
) -> OnaImageError {
    if image_result.is_null() {
        return OnaImageError::UnsupportedFormat;
    }

    match Image::solid(dimensions, fill_color) {
        Ok(image) => {
            leak_image(image, image_result);

            OnaImageError::None
        }
        Err(ImageError::UnsupportedFormat) => OnaImageError::UnsupportedFormat,
        Err(ImageError::OutOfMemory) => OnaImageError::OutOfMemory,
    }
}

unsafe extern "C" fn image_load(
    _allocator: *mut OnaAllocator,
    file_path: *const c_char,
    image_result: *mut OnaImage,
) -> OnaImageLoadError {
    if file_path.is_null() || image_result.is_null() {
        return OnaImageLoadError::FileError;
    }

    let file_path = match CStr::from_ptr(file_path).to_str() {
        Ok(path) => path,
        Err(_) => return OnaImageLoadError::FileError,
    };

    match image::load_image(Path::new(file_path)) {
        Ok(image) => {
            leak_image(image, image_result);

            OnaImageLoadError::None
        }
        Err(ImageLoadError::FileError) => OnaImageLoadError::FileError,
        Err(ImageLoadError::UnsupportedFormat) => OnaImageLoadError::UnsupportedFormat,
        Err(ImageLoadError::OutOfMemory) => OnaImageLoadError::OutOfMemory,
    }
}

unsafe extern "C" fn image_free(image: *mut OnaImage) {
    if image.is_null() {
        return;
    }

    let image = &mut *image;

    if image.pixels.is_null() || image.dimensions.x <= 0 || image.dimensions.y <= 0 {
        return;
    }

    let length = math::area(image.dimensions) as usize;
    let pixels = slice::from_raw_parts_mut(image.pixels, length) as *mut [Color];
    drop(Box::from_raw(pixels));

    image.pixels = ptr::null_mut();
    image.dimensions = Point2::new(0, 0);
}

unsafe extern "C" fn material_create(material_image: *const OnaImage) -> *mut OnaMaterial {
    let server = match graphics_server() {
        Some(server) => server,
        None => return ptr::null_mut(),
    };

    if material_image.is_null() {
        return ptr::null_mut();
    }

    let source = &*material_image;

    if source.pixels.is_null() || source.dimensions.x <= 0 || source.dimensions.y <= 0 {
        return ptr::null_mut();
    }

    let length = math::area(source.dimensions) as usize;
    let pixels = slice::from_raw_parts(source.pixels, length).to_vec();

    let image = match Image::from_pixels(source.dimensions, pixels) {
        Ok(image) => image,
        Err(_) => return ptr::null_mut(),
    };

    match sprite::create_sprite(server, &image) {
        Some(sprite) => Box::into_raw(Box::new(sprite)) as *mut OnaMaterial,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn material_free(material: *mut *mut OnaMaterial) {
    if material.is_null() || (*material).is_null() {
        return;
    }

    // The GL-side texture and uniform buffer stay in the server's tables
    // until the server is destroyed; only the handle is released here.
    drop(Box::from_raw(*material as *mut Sprite));

    *material = ptr::null_mut();
}

unsafe extern "C" fn render_sprite(
    graphics_queue: *mut OnaGraphicsQueue,
    sprite_material: *mut OnaMaterial,
    sprite: *const OnaSprite,
) {
    if graphics_queue.is_null() || sprite_material.is_null() || sprite.is_null() {
        return;
    }

    let queue = &*(graphics_queue as *const Mutex<GraphicsQueue>);
    let key = *(sprite_material as *const Sprite);
    let sprite = &*sprite;

    queue
        .lock()
        .unwrap()
        .draw(key, Vector2::new(sprite.origin.x, sprite.origin.y));
}

unsafe extern "C" fn channel_open(type_size: u32) -> *mut OnaChannel {
    if type_size == 0 {
        return ptr::null_mut();
    }

    Box::into_raw(Box::new(Channel::open(type_size as usize))) as *mut OnaChannel
}

unsafe extern "C" fn channel_close(channel: *mut *mut OnaChannel) {
    if channel.is_null() || (*channel).is_null() {
        return;
    }

    drop(Box::from_raw(*channel as *mut Channel));

    *channel = ptr::null_mut();
}

unsafe extern "C" fn channel_send(
    channel: *mut OnaChannel,
    input_buffer_length: usize,
    input_buffer_pointer: *const c_void,
) -> u32 {
    if channel.is_null() || input_buffer_pointer.is_null() {
        return 0;
    }

    let channel = &*(channel as *const Channel);
    let input = slice::from_raw_parts(input_buffer_pointer as *const u8, input_buffer_length);

    channel.send(input)
}

unsafe extern "C" fn channel_receive(
    channel: *mut OnaChannel,
    output_buffer_length: usize,
    output_buffer_pointer: *mut c_void,
) -> u32 {
    if channel.is_null() || output_buffer_pointer.is_null() {
        return 0;
    }

    let channel = &*(channel as *const Channel);
    let output = slice::from_raw_parts_mut(output_buffer_pointer as *mut u8, output_buffer_length);

    channel.receive(output)
}

static CONTEXT: OnaContext = OnaContext {
    spawnSystem: spawn_system,
    defaultAllocator: default_allocator,
    graphicsQueueAcquire: graphics_queue_acquire,
    imageSolid: image_solid,
    imageLoad: image_load,
    imageFree: image_free,
    materialCreate: material_create,
    materialFree: material_free,
    renderSprite: render_sprite,
    channelOpen: channel_open,
    channelClose: channel_close,
    channelSend: channel_send,
    channelReceive: channel_receive,
};

/// The vtable instance handed to every module.
pub fn context() -> &'static OnaContext {
    &CONTEXT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_image_round_trips_across_the_abi() {
        let mut image = OnaImage {
            allocator: ptr::null_mut(),
            pixels: ptr::null_mut(),
            dimensions: Point2::new(0, 0),
        };

        let error = unsafe {
            image_solid(
                default_allocator_ptr(),
                Point2::new(4, 4),
                Color::rgb(0xFF, 0, 0),
                &mut image,
            )
        };

        assert_eq!(error, OnaImageError::None);
        assert_eq!(image.dimensions, Point2::new(4, 4));
        assert!(!image.pixels.is_null());

        let pixels = unsafe { slice::from_raw_parts(image.pixels, 16) };
        assert!(pixels.iter().all(|&pixel| pixel == Color::rgb(0xFF, 0, 0)));

        unsafe { image_free(&mut image) };
        assert!(image.pixels.is_null());
    }

    #[test]
    fn degenerate_solid_image_reports_format_error() {
        let mut image = OnaImage {
            allocator: ptr::null_mut(),
            pixels: ptr::null_mut(),
            dimensions: Point2::new(0, 0),
        };

        let error = unsafe {
            image_solid(
                default_allocator_ptr(),
                Point2::new(0, 8),
                Color::BLACK,
                &mut image,
            )
        };

        assert_eq!(error, OnaImageError::UnsupportedFormat);
        assert!(image.pixels.is_null());
    }

    #[test]
    fn channels_round_trip_across_the_abi() {
        unsafe {
            let mut channel = channel_open(8);
            assert!(!channel.is_null());

            let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
            assert_eq!(
                channel_send(channel, payload.len(), payload.as_ptr() as *const c_void),
                8
            );

            let mut received = [0u8; 8];
            assert_eq!(
                channel_receive(channel, received.len(), received.as_mut_ptr() as *mut c_void),
                8
            );
            assert_eq!(received, payload);

            channel_close(&mut channel);
            assert!(channel.is_null());
        }
    }

    #[test]
    fn material_create_without_a_server_is_null() {
        let image = OnaImage {
            allocator: ptr::null_mut(),
            pixels: ptr::null_mut(),
            dimensions: Point2::new(1, 1),
        };

        assert!(unsafe { material_create(&image) }.is_null());
    }
}
