//! Thread-local sprite command queues.
//!
//! Every worker thread that draws acquires its own queue and is the only
//! writer to it; the main thread reads all queues during dispatch, after the
//! frame barrier, so the per-queue lock is never contended. The process-wide
//! registry exists solely so the dispatcher can enumerate the queues.

use crate::server::ResourceId;
use fxhash::FxHashMap;
use ona_core::math::{Matrix, Vector2, Vector4};
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::mem;
use std::slice;
use std::sync::{Arc, Mutex};

/// Instanced draws per batch, matching `INSTANCE_COUNT` in the sprite shader.
pub const MAX_BATCH: usize = 128;

/// The batching key: one polygon drawn with one material, plus the pixel
/// dimensions used to scale the unit quad. Only the two ids participate in
/// identity.
#[derive(Copy, Clone, Debug)]
pub struct Sprite {
    pub poly_id: ResourceId,
    pub material_id: ResourceId,
    pub dimensions: Vector2,
}

impl PartialEq for Sprite {
    fn eq(&self, that: &Sprite) -> bool {
        (self.poly_id, self.material_id) == (that.poly_id, that.material_id)
    }
}

impl Eq for Sprite {}

impl Hash for Sprite {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64((u64::from(self.poly_id) << 32) | u64::from(self.material_id));
    }
}

/// One uniform-buffer payload: per-instance transforms and sub-UV viewports.
/// `#[repr(C)]` so its bytes can be copied into the renderer uniform block
/// verbatim.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Chunk {
    pub transforms: [Matrix; MAX_BATCH],
    pub viewports: [Vector4; MAX_BATCH],
}

impl Chunk {
    fn new() -> Chunk {
        Chunk {
            transforms: [Matrix::IDENTITY; MAX_BATCH],
            viewports: [Vector4::new(0.0, 0.0, 0.0, 0.0); MAX_BATCH],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            slice::from_raw_parts(self as *const Chunk as *const u8, mem::size_of::<Chunk>())
        }
    }
}

pub struct Batch {
    pub count: usize,
    pub chunk: Chunk,
}

impl Batch {
    fn new() -> Batch {
        Batch {
            count: 0,
            chunk: Chunk::new(),
        }
    }
}

/// Per-thread accumulation of draws, keyed by sprite. Overflow past
/// [`MAX_BATCH`] entries per key spills into successive batches, preserving
/// submission order within the key.
pub struct GraphicsQueue {
    batch_sets: FxHashMap<Sprite, Vec<Batch>>,
}

impl GraphicsQueue {
    fn new() -> GraphicsQueue {
        GraphicsQueue {
            batch_sets: FxHashMap::default(),
        }
    }

    /// Appends one draw of `sprite`: the unit quad scaled to the sprite's
    /// pixel dimensions, translated to `position`, sampling the full texture.
    pub fn draw(&mut self, sprite: Sprite, position: Vector2) {
        let batches = self
            .batch_sets
            .entry(sprite)
            .or_insert_with(|| vec![Batch::new()]);

        if batches.last().unwrap().count == MAX_BATCH {
            batches.push(Batch::new());
        }

        let batch = batches.last_mut().unwrap();

        batch.chunk.transforms[batch.count] = Matrix {
            elements: [
                sprite.dimensions.x,
                0.0,
                0.0,
                position.x,
                0.0,
                sprite.dimensions.y,
                0.0,
                position.y,
                0.0,
                0.0,
                1.0,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        };

        batch.chunk.viewports[batch.count] = Vector4::new(0.0, 0.0, 1.0, 1.0);
        batch.count += 1;
    }

    /// Takes this frame's accumulated batches, leaving the queue empty.
    pub(crate) fn take_batch_sets(&mut self) -> FxHashMap<Sprite, Vec<Batch>> {
        mem::replace(&mut self.batch_sets, FxHashMap::default())
    }

    #[cfg(test)]
    fn batches_of(&self, sprite: &Sprite) -> &[Batch] {
        &self.batch_sets[sprite]
    }
}

lazy_static! {
    static ref QUEUE_REGISTRY: Mutex<Vec<Arc<Mutex<GraphicsQueue>>>> = Mutex::new(Vec::new());
}

thread_local! {
    static LOCAL_QUEUE: RefCell<Option<Arc<Mutex<GraphicsQueue>>>> = RefCell::new(None);
}

/// Returns the calling thread's graphics queue, creating and registering it
/// on first use.
pub fn acquire_queue() -> Arc<Mutex<GraphicsQueue>> {
    LOCAL_QUEUE.with(|local| {
        let mut local = local.borrow_mut();

        if let Some(queue) = &*local {
            return queue.clone();
        }

        let queue = Arc::new(Mutex::new(GraphicsQueue::new()));

        QUEUE_REGISTRY.lock().unwrap().push(queue.clone());
        *local = Some(queue.clone());

        queue
    })
}

/// Runs `visit` over every registered queue. Main-thread dispatch only; all
/// workers have passed the frame barrier by the time this runs.
pub(crate) fn for_each_queue<F>(mut visit: F)
where
    F: FnMut(&mut GraphicsQueue),
{
    for queue in QUEUE_REGISTRY.lock().unwrap().iter() {
        visit(&mut queue.lock().unwrap());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn test_sprite(material_id: ResourceId) -> Sprite {
        Sprite {
            poly_id: 1,
            material_id,
            dimensions: Vector2::new(32.0, 32.0),
        }
    }

    #[test]
    fn draws_accumulate_into_one_batch() {
        let mut queue = GraphicsQueue::new();
        let sprite = test_sprite(1);

        for _ in 0..MAX_BATCH {
            queue.draw(sprite, Vector2::new(0.0, 0.0));
        }

        let batches = queue.batches_of(&sprite);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].count, MAX_BATCH);
    }

    #[test]
    fn overflow_spills_into_successive_batches() {
        let mut queue = GraphicsQueue::new();
        let sprite = test_sprite(1);

        for _ in 0..200 {
            queue.draw(sprite, Vector2::new(0.0, 0.0));
        }

        let batches = queue.batches_of(&sprite);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].count, MAX_BATCH);
        assert_eq!(batches[1].count, 72);
    }

    #[test]
    fn batch_count_is_ceiling_of_draws() {
        for draws in &[1usize, 127, 128, 129, 256, 257] {
            let mut queue = GraphicsQueue::new();
            let sprite = test_sprite(1);

            for _ in 0..*draws {
                queue.draw(sprite, Vector2::new(0.0, 0.0));
            }

            let batches = queue.batches_of(&sprite);
            assert_eq!(batches.len(), (draws + MAX_BATCH - 1) / MAX_BATCH);
            assert_eq!(batches.iter().map(|batch| batch.count).sum::<usize>(), *draws);
        }
    }

    #[test]
    fn interleaved_sprites_batch_separately() {
        let mut queue = GraphicsQueue::new();
        let a = test_sprite(1);
        let b = test_sprite(2);

        for _ in 0..2 {
            queue.draw(a, Vector2::new(0.0, 0.0));
            queue.draw(b, Vector2::new(0.0, 0.0));
        }

        assert_eq!(queue.batches_of(&a).len(), 1);
        assert_eq!(queue.batches_of(&a)[0].count, 2);
        assert_eq!(queue.batches_of(&b).len(), 1);
        assert_eq!(queue.batches_of(&b)[0].count, 2);
    }

    #[test]
    fn draw_writes_transform_and_viewport() {
        let mut queue = GraphicsQueue::new();
        let sprite = test_sprite(1);

        queue.draw(sprite, Vector2::new(10.0, 20.0));

        let batch = &queue.batches_of(&sprite)[0];
        let transform = &batch.chunk.transforms[0].elements;

        assert_eq!(transform[0], 32.0);
        assert_eq!(transform[3], 10.0);
        assert_eq!(transform[5], 32.0);
        assert_eq!(transform[7], 20.0);
        assert_eq!(batch.chunk.viewports[0], Vector4::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn take_leaves_the_queue_empty() {
        let mut queue = GraphicsQueue::new();

        queue.draw(test_sprite(1), Vector2::new(0.0, 0.0));

        assert_eq!(queue.take_batch_sets().len(), 1);
        assert!(queue.take_batch_sets().is_empty());
    }

    #[test]
    fn sprite_identity_ignores_dimensions() {
        let mut a = test_sprite(7);
        let mut b = test_sprite(7);
        a.dimensions = Vector2::new(1.0, 1.0);
        b.dimensions = Vector2::new(64.0, 64.0);

        assert_eq!(a, b);
    }

    #[test]
    fn each_thread_gets_its_own_queue() {
        let here = acquire_queue();
        let again = acquire_queue();
        assert!(Arc::ptr_eq(&here, &again));

        let there = thread::spawn(|| acquire_queue()).join().unwrap();
        assert!(!Arc::ptr_eq(&here, &there));
    }
}
