//! The module runtime: the C ABI surface handed to game modules, dynamic
//! library discovery, and the per-frame system execution.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

pub mod abi;
mod context;
mod loader;
mod runtime;

pub use self::context::{context, publish_graphics_server, retract_graphics_server};
pub use self::runtime::SystemRuntime;
