//! The OpenGL-backed graphics server and everything that feeds it: property
//! layouts, windowing events, thread-local sprite queues and the built-in
//! instanced sprite renderer.
//!
//! The server itself is main-thread-only; worker threads interact with
//! graphics exclusively through [`queue::acquire_queue`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod api;
pub mod events;
pub mod layout;
pub mod queue;
mod server;
mod shader;
pub mod sprite;

pub use self::events::Events;
pub use self::layout::{Property, PropertyType};
pub use self::queue::{GraphicsQueue, Sprite, MAX_BATCH};
pub use self::server::{load_opengl, GraphicsLoadError, GraphicsServer, ResourceId};
