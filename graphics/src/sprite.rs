//! The built-in instanced sprite renderer.
//!
//! Lazily creates a singleton renderer + unit-quad polygon on the server and
//! registers the dispatcher that flushes every thread-local queue's batches
//! once per frame.

use crate::layout::{Property, PropertyType};
use crate::queue::{self, Sprite, MAX_BATCH};
use crate::server::{GraphicsServer, ResourceId};
use ona_core::image::Image;
use ona_core::math::{Matrix, Vector2, Vector4};
use std::mem;
use std::slice;
use std::sync::Mutex;

static VERTEX_SOURCE: &str = "\
#version 430 core
#define INSTANCE_COUNT 128

in vec2 quadVertex;
in vec2 quadUv;

out vec2 texCoords;
out vec4 texTint;

layout(std140, row_major) uniform Viewport {
	mat4x4 projectionTransform;
};

layout(std140, row_major) uniform Renderer {
	mat4x4 transforms[INSTANCE_COUNT];
	vec4 viewports[INSTANCE_COUNT];
};

layout(std140, row_major) uniform Material {
	vec4 tintColor;
};

uniform sampler2D spriteTexture;

void main() {
	const vec4 viewport = viewports[gl_InstanceID];

	texCoords = ((quadUv * viewport.zw) + viewport.xy);
	texTint = tintColor;

	gl_Position = (
		projectionTransform * transforms[gl_InstanceID] * vec4(quadVertex, 0.0, 1.0)
	);
}
";

static FRAGMENT_SOURCE: &str = "\
#version 430 core

in vec2 texCoords;
in vec4 texTint;
out vec4 outColor;

uniform sampler2D spriteTexture;

void main() {
	const vec4 spriteTextureColor = (texture(spriteTexture, texCoords) * texTint);

	if (spriteTextureColor.a == 0.0) discard;

	outColor = spriteTextureColor;
}
";

#[repr(C)]
#[derive(Copy, Clone)]
struct Vertex2D {
    position: Vector2,
    uv: Vector2,
}

const fn vertex(x: f32, y: f32) -> Vertex2D {
    Vertex2D {
        position: Vector2 { x, y },
        uv: Vector2 { x, y },
    }
}

/// Unit quad as two counter-clockwise triangles, UVs matching positions.
static QUAD_VERTICES: [Vertex2D; 6] = [
    vertex(1.0, 1.0),
    vertex(1.0, 0.0),
    vertex(0.0, 1.0),
    vertex(1.0, 0.0),
    vertex(0.0, 0.0),
    vertex(0.0, 1.0),
];

fn vertex_layout() -> Vec<Property> {
    vec![
        Property::new(PropertyType::Float32, 2, "quadVertex"),
        Property::new(PropertyType::Float32, 2, "quadUv"),
    ]
}

fn renderer_layout() -> Vec<Property> {
    vec![
        Property::new(PropertyType::Float32, (16 * MAX_BATCH) as u32, "transforms"),
        Property::new(PropertyType::Float32, (4 * MAX_BATCH) as u32, "viewports"),
    ]
}

fn material_layout() -> Vec<Property> {
    vec![Property::new(PropertyType::Float32, 4, "tintColor")]
}

struct SpriteKeys {
    renderer_id: ResourceId,
    quad_poly_id: ResourceId,
}

lazy_static! {
    static ref SPRITE_KEYS: Mutex<Option<SpriteKeys>> = Mutex::new(None);
}

fn as_bytes<T: Copy>(value: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>()) }
}

/// Ensures the singleton sprite renderer exists on `server`, registering the
/// sprite dispatcher on first initialization. Main thread only.
pub fn initialize(server: &mut GraphicsServer) -> bool {
    let mut keys = SPRITE_KEYS.lock().unwrap();

    if keys.is_some() {
        return true;
    }

    let renderer_id = server.create_renderer(
        VERTEX_SOURCE,
        FRAGMENT_SOURCE,
        vertex_layout(),
        renderer_layout(),
        material_layout(),
    );

    if renderer_id == 0 {
        error!("sprite renderer failed to initialize");

        return false;
    }

    let quad_poly_id = server.create_poly(renderer_id, as_bytes(&QUAD_VERTICES));

    if quad_poly_id == 0 {
        error!("sprite quad failed to initialize");

        return false;
    }

    server.register_dispatcher(Box::new(move |server: &mut GraphicsServer| {
        let mut projection_set = false;

        queue::for_each_queue(|queue| {
            let batch_sets = queue.take_batch_sets();

            if batch_sets.is_empty() {
                return;
            }

            if !projection_set {
                let viewport = server.viewport_of();

                server.update_projection(&Matrix::orthographic(
                    0.0,
                    viewport.x as f32,
                    viewport.y as f32,
                    0.0,
                    -1.0,
                    1.0,
                ));

                projection_set = true;
            }

            for (sprite, batches) in batch_sets {
                for batch in &batches {
                    if batch.count == 0 {
                        continue;
                    }

                    server.update_renderer_userdata(renderer_id, batch.chunk.as_bytes());
                    server.render_poly_instanced(
                        renderer_id,
                        sprite.poly_id,
                        sprite.material_id,
                        batch.count,
                    );
                }
            }
        });
    }));

    *keys = Some(SpriteKeys {
        renderer_id,
        quad_poly_id,
    });

    true
}

/// Creates a sprite drawing `image` through the built-in renderer, with the
/// material tint starting at opaque white. Main thread only.
pub fn create_sprite(server: &mut GraphicsServer, image: &Image) -> Option<Sprite> {
    if !initialize(server) {
        return None;
    }

    let (renderer_id, quad_poly_id) = {
        let keys = SPRITE_KEYS.lock().unwrap();
        let keys = keys.as_ref().unwrap();

        (keys.renderer_id, keys.quad_poly_id)
    };

    let material_id = server.create_material(renderer_id, image);

    if material_id == 0 {
        return None;
    }

    let tint = Vector4::new(1.0, 1.0, 1.0, 1.0);
    server.update_material_userdata(material_id, as_bytes(&tint));

    let dimensions = image.dimensions();

    Some(Sprite {
        poly_id: quad_poly_id,
        material_id,
        dimensions: Vector2::new(dimensions.x as f32, dimensions.y as f32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::queue::Chunk;

    #[test]
    fn chunk_bytes_match_the_renderer_uniform_block() {
        assert_eq!(
            mem::size_of::<Chunk>(),
            layout::uniform_size(&renderer_layout())
        );
    }

    #[test]
    fn quad_vertices_fit_the_vertex_layout() {
        assert_eq!(layout::vertex_stride(&vertex_layout()), 16);
        assert_eq!(as_bytes(&QUAD_VERTICES).len() % 16, 0);
        assert_eq!(as_bytes(&QUAD_VERTICES).len() / 16, 6);
    }

    #[test]
    fn shader_interface_names_its_blocks() {
        for block in &["Viewport", "Renderer", "Material"] {
            assert!(VERTEX_SOURCE.contains(block));
        }

        assert!(FRAGMENT_SOURCE.contains("discard"));
    }
}
