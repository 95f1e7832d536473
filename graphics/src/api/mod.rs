//! OpenGL 4.3 core bindings generated by gl_generator at build time. All
//! entry points hang off the [`Gl`] struct loaded from the live context.
#![allow(bad_style)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
