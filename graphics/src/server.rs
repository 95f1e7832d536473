//! The OpenGL graphics server: owns the window, the GL context and the
//! resource tables, and dispatches the per-frame draw batches.
//!
//! Every method on [`GraphicsServer`] must be called from the main thread.
//! Worker threads never see this type; they enqueue draws through
//! [`crate::queue`].

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::events::{self, Events};
use crate::layout::{self, Property};
use ona_core::color::Color;
use ona_core::image::Image;
use ona_core::math::{Matrix, Point2};
use ona_core::text::Text;
use glutin::{Api, ContextBuilder, GlContext, GlProfile, GlRequest, GlWindow};
use std::error::Error;
use std::fmt;
use std::mem;
use std::ptr;
use std::slice;
use std::str;
use winit::dpi::LogicalSize;
use winit::{ElementState, Event, EventsLoop, KeyboardInput, WindowBuilder, WindowEvent};

/// Non-zero handle into one of the server's resource tables; zero is the
/// failure sentinel. Renderer, polygon and material ids are separate spaces.
pub type ResourceId = u32;

const RENDERER_BUFFER_BINDING: GLuint = 0;
const MATERIAL_BUFFER_BINDING: GLuint = 1;
const VIEWPORT_BUFFER_BINDING: GLuint = 2;
const MATERIAL_TEXTURE_BINDING: GLuint = 0;

extern "system" fn debug_callback(
    _source: GLenum,
    _ty: GLenum,
    _id: GLuint,
    severity: GLenum,
    length: GLsizei,
    msg: *const GLchar,
    _data: *mut GLvoid,
) {
    let msg = unsafe {
        str::from_utf8(slice::from_raw_parts(msg as *const u8, length as usize))
            .unwrap_or("<malformed driver message>")
    };

    let level = match severity {
        gl::DEBUG_SEVERITY_HIGH => log::Level::Error,
        gl::DEBUG_SEVERITY_MEDIUM => log::Level::Warn,
        gl::DEBUG_SEVERITY_LOW => log::Level::Info,
        _ => log::Level::Debug,
    };

    log!(level, "(GL) {}", msg);
}

/// A compiled shader program plus the three property layouts it agreed to
/// consume.
struct Renderer {
    shader_program: GLuint,
    uniform_buffer: GLuint,
    vertex_layout: Vec<Property>,
    renderer_layout: Vec<Property>,
    material_layout: Vec<Property>,
}

/// An immutable vertex buffer bound to one renderer.
struct Polygon {
    renderer_id: ResourceId,
    vertex_buffer: GLuint,
    vertex_array: GLuint,
    vertex_count: GLsizei,
}

/// A texture plus a material uniform buffer bound to one renderer.
struct Material {
    renderer_id: ResourceId,
    texture: GLuint,
    uniform_buffer: GLuint,
}

type Dispatcher = Box<dyn Fn(&mut GraphicsServer)>;

/// Fatal failures bringing up the window or the GL context.
#[derive(Debug)]
pub enum GraphicsLoadError {
    Window(glutin::CreationError),
    Context(glutin::ContextError),
}

impl fmt::Display for GraphicsLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GraphicsLoadError::Window(error) => write!(f, "failed to create window: {}", error),
            GraphicsLoadError::Context(error) => {
                write!(f, "failed to acquire GL context: {}", error)
            }
        }
    }
}

impl Error for GraphicsLoadError {}

pub struct GraphicsServer {
    events_loop: EventsLoop,
    window: GlWindow,
    gl: Gl,
    display_size: Point2,
    viewport_buffer: GLuint,
    renderers: Vec<Renderer>,
    polys: Vec<Polygon>,
    materials: Vec<Material>,
    dispatchers: Vec<Dispatcher>,
    time_last: u64,
}

/// Creates the window, the GL 4.3 core context and the server around them.
pub fn load_opengl(
    title: &Text,
    width: i32,
    height: i32,
) -> Result<GraphicsServer, GraphicsLoadError> {
    let events_loop = EventsLoop::new();

    let window_builder = WindowBuilder::new()
        .with_title(title.as_str())
        .with_dimensions(LogicalSize::new(f64::from(width), f64::from(height)));

    let context_builder = ContextBuilder::new()
        .with_gl_profile(GlProfile::Core)
        .with_gl(GlRequest::Specific(Api::OpenGl, (4, 3)))
        .with_gl_debug_flag(true)
        .with_vsync(true);

    let window = GlWindow::new(window_builder, context_builder, &events_loop)
        .map_err(GraphicsLoadError::Window)?;

    unsafe {
        window
            .make_current()
            .map_err(GraphicsLoadError::Context)?;
    }

    let gl = Gl::load_with(|symbol| window.get_proc_address(symbol) as *const _);

    unsafe {
        gl.Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.DebugMessageCallback(debug_callback as GLDEBUGPROC, ptr::null());
        gl.DebugMessageControl(gl::DONT_CARE, gl::DONT_CARE, gl::DONT_CARE, 0, ptr::null(), 1);

        let mut major_version = 0;
        let mut minor_version = 0;
        gl.GetIntegerv(gl::MAJOR_VERSION, &mut major_version);
        gl.GetIntegerv(gl::MINOR_VERSION, &mut minor_version);
        info!("OpenGL version {}.{}", major_version, minor_version);

        gl.Enable(gl::DEPTH_TEST);
        gl.Viewport(0, 0, width, height);
    }

    let viewport_buffer = unsafe {
        let mut obj = 0;
        gl.CreateBuffers(1, &mut obj);
        gl.NamedBufferData(
            obj,
            mem::size_of::<Matrix>() as GLsizeiptr,
            ptr::null(),
            gl::DYNAMIC_DRAW,
        );
        obj
    };

    Ok(GraphicsServer {
        events_loop,
        window,
        gl,
        display_size: Point2::new(width, height),
        viewport_buffer,
        renderers: Vec::new(),
        polys: Vec::new(),
        materials: Vec::new(),
        dispatchers: Vec::new(),
        time_last: time::precise_time_ns(),
    })
}

impl GraphicsServer {
    /// Clears the backbuffer to black.
    pub fn clear(&mut self) {
        self.colored_clear(Color::BLACK);
    }

    /// Clears the backbuffer to `color`.
    pub fn colored_clear(&mut self, color: Color) {
        let rgba = color.normalized();

        unsafe {
            self.gl.ClearColor(rgba.x, rgba.y, rgba.z, rgba.w);
            self.gl.Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }
    }

    /// Drains pending window events into `events`, refreshing the frame
    /// delta and the key-held bitmap. Returns `false` once a quit has been
    /// requested.
    pub fn read_events(&mut self, events: &mut Events) -> bool {
        let time_now = time::precise_time_ns();
        events.delta_time = (time_now - self.time_last) as f32 / 1_000_000.0;
        self.time_last = time_now;

        let mut open = true;
        let mut resized: Option<LogicalSize> = None;
        let keys_held = &mut events.keys_held;

        self.events_loop.poll_events(|event| {
            if let Event::WindowEvent { event, .. } = event {
                match event {
                    WindowEvent::CloseRequested => open = false,
                    WindowEvent::Resized(size) => resized = Some(size),
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state,
                                virtual_keycode: Some(key),
                                ..
                            },
                        ..
                    } => {
                        if let Some(usage) = events::hid_usage(key) {
                            keys_held[usage] = state == ElementState::Pressed;
                        }
                    }
                    _ => {}
                }
            }
        });

        if let Some(size) = resized {
            self.display_size = Point2::new(size.width as i32, size.height as i32);

            unsafe {
                self.gl
                    .Viewport(0, 0, self.display_size.x, self.display_size.y);
            }
        }

        open
    }

    /// Runs the registered dispatchers in registration order, then presents
    /// the frame.
    pub fn update(&mut self) {
        let dispatchers = mem::replace(&mut self.dispatchers, Vec::new());

        for dispatcher in &dispatchers {
            dispatcher(self);
        }

        // Dispatchers may have registered more dispatchers; preserve overall
        // registration order.
        let mut dispatchers = dispatchers;
        dispatchers.append(&mut self.dispatchers);
        self.dispatchers = dispatchers;

        if let Err(error) = self.window.swap_buffers() {
            warn!("failed to present frame: {}", error);
        }
    }

    /// Registers `dispatcher` to be invoked by every [`GraphicsServer::update`]
    /// from now on. Dispatchers cannot be unregistered.
    pub fn register_dispatcher(&mut self, dispatcher: Dispatcher) {
        self.dispatchers.push(dispatcher);
    }

    /// Current drawable size in pixels.
    pub fn viewport_of(&self) -> Point2 {
        self.display_size
    }

    /// Compiles and links a shader program, allocates its renderer uniform
    /// buffer and records the layouts it consumes. Returns the new renderer
    /// id, or zero on any compile, link or allocation failure.
    pub fn create_renderer(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        vertex_layout: Vec<Property>,
        renderer_layout: Vec<Property>,
        material_layout: Vec<Property>,
    ) -> ResourceId {
        let uniform_buffer = match self.create_uniform_buffer(layout::uniform_size(&renderer_layout))
        {
            Some(buffer) => buffer,
            None => return 0,
        };

        let shader_program = match crate::shader::link_program(&self.gl, vertex_source, fragment_source)
        {
            Ok(program) => program,
            Err(error) => {
                error!("renderer shader failed to build: {}", error);

                unsafe { self.gl.DeleteBuffers(1, &uniform_buffer) };

                return 0;
            }
        };

        unsafe {
            self.bind_uniform_block(shader_program, b"Renderer\0", RENDERER_BUFFER_BINDING);
            self.bind_uniform_block(shader_program, b"Material\0", MATERIAL_BUFFER_BINDING);
            self.bind_uniform_block(shader_program, b"Viewport\0", VIEWPORT_BUFFER_BINDING);
        }

        self.renderers.push(Renderer {
            shader_program,
            uniform_buffer,
            vertex_layout,
            renderer_layout,
            material_layout,
        });

        self.renderers.len() as ResourceId
    }

    /// Uploads `vertex_data` into an immutable vertex buffer laid out by the
    /// renderer's vertex layout. The data must hold a whole number of
    /// vertices. Returns the new polygon id or zero.
    pub fn create_poly(&mut self, renderer_id: ResourceId, vertex_data: &[u8]) -> ResourceId {
        let (stride, attributes) = {
            let renderer = match self.renderer(renderer_id) {
                Some(renderer) => renderer,
                None => return 0,
            };

            if !layout::validate_vertices(&renderer.vertex_layout, vertex_data) {
                warn!(
                    "vertex data of {} bytes does not fit renderer {}'s vertex layout",
                    vertex_data.len(),
                    renderer_id
                );

                return 0;
            }

            let attributes: Vec<(GLint, GLenum, usize)> = renderer
                .vertex_layout
                .iter()
                .map(|property| {
                    (
                        property.components as GLint,
                        property.ptype.to_gl(),
                        property.size(),
                    )
                })
                .collect();

            (layout::vertex_stride(&renderer.vertex_layout), attributes)
        };

        unsafe {
            let mut vertex_buffer = 0;
            self.gl.CreateBuffers(1, &mut vertex_buffer);
            self.gl.NamedBufferStorage(
                vertex_buffer,
                vertex_data.len() as GLsizeiptr,
                vertex_data.as_ptr() as *const GLvoid,
                gl::DYNAMIC_STORAGE_BIT,
            );

            if self.gl.GetError() != gl::NO_ERROR {
                self.gl.DeleteBuffers(1, &vertex_buffer);

                return 0;
            }

            let mut vertex_array = 0;
            self.gl.CreateVertexArrays(1, &mut vertex_array);
            self.gl
                .VertexArrayVertexBuffer(vertex_array, 0, vertex_buffer, 0, stride as GLsizei);

            let mut offset = 0;

            for (index, (components, gl_type, size)) in attributes.iter().enumerate() {
                self.gl.EnableVertexArrayAttrib(vertex_array, index as GLuint);
                self.gl.VertexArrayAttribFormat(
                    vertex_array,
                    index as GLuint,
                    *components,
                    *gl_type,
                    gl::FALSE,
                    offset,
                );
                self.gl
                    .VertexArrayAttribBinding(vertex_array, index as GLuint, 0);

                offset += *size as GLuint;
            }

            if self.gl.GetError() != gl::NO_ERROR {
                self.gl.DeleteVertexArrays(1, &vertex_array);
                self.gl.DeleteBuffers(1, &vertex_buffer);

                return 0;
            }

            self.polys.push(Polygon {
                renderer_id,
                vertex_buffer,
                vertex_array,
                vertex_count: (vertex_data.len() / stride) as GLsizei,
            });
        }

        self.polys.len() as ResourceId
    }

    /// Uploads `image` into a new RGBA8 texture with linear filtering and
    /// edge clamping, paired with a material uniform buffer sized to the
    /// renderer's material layout. Returns the new material id or zero.
    pub fn create_material(&mut self, renderer_id: ResourceId, image: &Image) -> ResourceId {
        let material_uniform_size = match self.renderer(renderer_id) {
            Some(renderer) => layout::uniform_size(&renderer.material_layout),
            None => return 0,
        };

        let uniform_buffer = match self.create_uniform_buffer(material_uniform_size) {
            Some(buffer) => buffer,
            None => return 0,
        };

        let dimensions = image.dimensions();

        unsafe {
            let mut texture = 0;
            self.gl.CreateTextures(gl::TEXTURE_2D, 1, &mut texture);
            self.gl
                .TextureStorage2D(texture, 1, gl::RGBA8, dimensions.x, dimensions.y);

            if self.gl.GetError() != gl::NO_ERROR {
                self.gl.DeleteTextures(1, &texture);
                self.gl.DeleteBuffers(1, &uniform_buffer);

                return 0;
            }

            self.gl.TextureSubImage2D(
                texture,
                0,
                0,
                0,
                dimensions.x,
                dimensions.y,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                image.pixel_bytes().as_ptr() as *const GLvoid,
            );

            let settings = [
                (gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint),
                (gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint),
                (gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint),
                (gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint),
            ];

            for (parameter, value) in &settings {
                self.gl.TextureParameteri(texture, *parameter, *value);
            }

            if self.gl.GetError() != gl::NO_ERROR {
                self.gl.DeleteTextures(1, &texture);
                self.gl.DeleteBuffers(1, &uniform_buffer);

                return 0;
            }

            self.materials.push(Material {
                renderer_id,
                texture,
                uniform_buffer,
            });
        }

        self.materials.len() as ResourceId
    }

    /// Rewrites the renderer's uniform block. The data must match the
    /// renderer layout's uniform size exactly; otherwise this is a no-op.
    pub fn update_renderer_userdata(&mut self, renderer_id: ResourceId, data: &[u8]) {
        let buffer = match self.renderer(renderer_id) {
            Some(renderer) if layout::validate_uniform(&renderer.renderer_layout, data) => {
                renderer.uniform_buffer
            }
            _ => return,
        };

        self.write_uniform_buffer(buffer, data);
    }

    /// Rewrites the material's uniform block, validated against the owning
    /// renderer's material layout.
    pub fn update_material_userdata(&mut self, material_id: ResourceId, data: &[u8]) {
        let buffer = match self.material(material_id) {
            Some(material) => {
                let valid = self
                    .renderer(material.renderer_id)
                    .map(|renderer| layout::validate_uniform(&renderer.material_layout, data))
                    .unwrap_or(false);

                if !valid {
                    return;
                }

                material.uniform_buffer
            }
            None => return,
        };

        self.write_uniform_buffer(buffer, data);
    }

    /// Rewrites the shared `Viewport` uniform block read by every renderer.
    pub fn update_projection(&mut self, projection: &Matrix) {
        unsafe {
            self.gl.NamedBufferSubData(
                self.viewport_buffer,
                0,
                mem::size_of::<Matrix>() as GLsizeiptr,
                projection.elements.as_ptr() as *const GLvoid,
            );
            self.gl.BindBufferBase(
                gl::UNIFORM_BUFFER,
                VIEWPORT_BUFFER_BINDING,
                self.viewport_buffer,
            );
        }
    }

    /// Issues one instanced draw of `count` instances. Any zero id, unknown
    /// id or out-of-range count is a silent no-op.
    pub fn render_poly_instanced(
        &mut self,
        renderer_id: ResourceId,
        poly_id: ResourceId,
        material_id: ResourceId,
        count: usize,
    ) {
        if count > i32::max_value() as usize {
            return;
        }

        let (renderer, poly, material) = match (
            self.renderer(renderer_id),
            self.poly(poly_id),
            self.material(material_id),
        ) {
            (Some(renderer), Some(poly), Some(material)) => (renderer, poly, material),
            _ => return,
        };

        unsafe {
            self.gl.BindBufferBase(
                gl::UNIFORM_BUFFER,
                RENDERER_BUFFER_BINDING,
                renderer.uniform_buffer,
            );
            self.gl.BindBufferBase(
                gl::UNIFORM_BUFFER,
                MATERIAL_BUFFER_BINDING,
                material.uniform_buffer,
            );
            self.gl.BindBuffer(gl::ARRAY_BUFFER, poly.vertex_buffer);
            self.gl.BindVertexArray(poly.vertex_array);
            self.gl.UseProgram(renderer.shader_program);
            self.gl
                .BindTextureUnit(MATERIAL_TEXTURE_BINDING, material.texture);
            self.gl
                .DrawArraysInstanced(gl::TRIANGLES, 0, poly.vertex_count, count as GLsizei);
        }
    }

    fn renderer(&self, id: ResourceId) -> Option<&Renderer> {
        id.checked_sub(1)
            .and_then(|index| self.renderers.get(index as usize))
    }

    fn poly(&self, id: ResourceId) -> Option<&Polygon> {
        id.checked_sub(1)
            .and_then(|index| self.polys.get(index as usize))
    }

    fn material(&self, id: ResourceId) -> Option<&Material> {
        id.checked_sub(1)
            .and_then(|index| self.materials.get(index as usize))
    }

    fn create_uniform_buffer(&self, size: usize) -> Option<GLuint> {
        unsafe {
            let mut obj = 0;
            self.gl.CreateBuffers(1, &mut obj);
            self.gl
                .NamedBufferData(obj, size as GLsizeiptr, ptr::null(), gl::DYNAMIC_DRAW);

            if self.gl.GetError() != gl::NO_ERROR {
                self.gl.DeleteBuffers(1, &obj);

                return None;
            }

            Some(obj)
        }
    }

    unsafe fn bind_uniform_block(&self, program: GLuint, name: &[u8], binding: GLuint) {
        let index = self
            .gl
            .GetUniformBlockIndex(program, name.as_ptr() as *const GLchar);

        if index != gl::INVALID_INDEX {
            self.gl.UniformBlockBinding(program, index, binding);
        }
    }

    fn write_uniform_buffer(&self, buffer: GLuint, data: &[u8]) {
        unsafe {
            let mapped = self.gl.MapNamedBuffer(buffer, gl::WRITE_ONLY) as *mut u8;

            if mapped.is_null() {
                warn!("failed to map uniform buffer {}", buffer);

                return;
            }

            ptr::copy_nonoverlapping(data.as_ptr(), mapped, data.len());
            self.gl.UnmapNamedBuffer(buffer);
        }
    }
}

impl Drop for GraphicsServer {
    fn drop(&mut self) {
        unsafe {
            for renderer in &self.renderers {
                self.gl.DeleteProgram(renderer.shader_program);
                self.gl.DeleteBuffers(1, &renderer.uniform_buffer);
            }

            for poly in &self.polys {
                self.gl.DeleteBuffers(1, &poly.vertex_buffer);
                self.gl.DeleteVertexArrays(1, &poly.vertex_array);
            }

            for material in &self.materials {
                self.gl.DeleteTextures(1, &material.texture);
                self.gl.DeleteBuffers(1, &material.uniform_buffer);
            }

            self.gl.DeleteBuffers(1, &self.viewport_buffer);
        }
    }
}
