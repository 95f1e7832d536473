//! Sample game module: a solid red square steered with the A and D keys.
//!
//! Build as a `cdylib` and drop the resulting library into the host's
//! `modules/` directory.

use ona_core::color::Color;
use ona_core::math::{Point2, Vector3};
use ona_module::abi::*;
use std::mem;
use std::os::raw::c_void;
use std::ptr;

const PLAYER_SIZE: i32 = 32;
const PLAYER_SPEED: f32 = 0.25;

#[repr(C)]
struct PlayerSystem {
    material: *mut OnaMaterial,
    x: f32,
    y: f32,
}

unsafe extern "C" fn player_init(userdata: *mut c_void, ona: *const OnaContext) {
    let player = &mut *(userdata as *mut PlayerSystem);
    let ona = &*ona;

    let mut image = OnaImage {
        allocator: ptr::null_mut(),
        pixels: ptr::null_mut(),
        dimensions: Point2::new(0, 0),
    };

    let error = (ona.imageSolid)(
        (ona.defaultAllocator)(),
        Point2::new(PLAYER_SIZE, PLAYER_SIZE),
        Color::rgb(0xFF, 0x00, 0x00),
        &mut image,
    );

    if error == OnaImageError::None {
        player.material = (ona.materialCreate)(&image);
        (ona.imageFree)(&mut image);
    }
}

unsafe extern "C" fn player_process(
    userdata: *mut c_void,
    ona: *const OnaContext,
    events: *const OnaEvents,
) {
    let player = &mut *(userdata as *mut PlayerSystem);
    let ona = &*ona;
    let events = &*events;

    if player.material.is_null() {
        return;
    }

    if events.keys_held[KEY_A] {
        player.x -= PLAYER_SPEED * events.delta_time;
    }

    if events.keys_held[KEY_D] {
        player.x += PLAYER_SPEED * events.delta_time;
    }

    let sprite = OnaSprite {
        origin: Vector3::new(player.x, player.y, 0.0),
        tint: Color::WHITE,
    };

    (ona.renderSprite)((ona.graphicsQueueAcquire)(), player.material, &sprite);
}

unsafe extern "C" fn player_exit(userdata: *mut c_void, ona: *const OnaContext) {
    let player = &mut *(userdata as *mut PlayerSystem);

    ((*ona).materialFree)(&mut player.material);
}

static PLAYER_SYSTEM: SystemInfo = SystemInfo {
    size: mem::size_of::<PlayerSystem>() as u32,
    init: Some(player_init),
    process: Some(player_process),
    finalize: Some(player_exit),
};

#[no_mangle]
pub unsafe extern "C" fn OnaInit(ona: *const OnaContext) -> bool {
    ((*ona).spawnSystem)(&PLAYER_SYSTEM)
}

#[no_mangle]
pub unsafe extern "C" fn OnaExit(_ona: *const OnaContext) {}
