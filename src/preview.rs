//! Revocable preview handles for queued originals.
//!
//! Every accepted upload gets a [`PreviewHandle`]: shared access to the
//! decoded original plus a registration in a [`PreviewRegistry`]. The
//! registration is released when the handle drops, which happens when its
//! job is removed, the queue is reset, or the queue itself goes away. A
//! handle is not `Clone`, so it is released exactly once.
//!
//! [`PreviewRegistry::live_count`] reports outstanding handles; it should be
//! zero once the queue is empty.

use image::DynamicImage;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
struct RegistryInner {
    next_key: u64,
    live: HashSet<u64>,
}

/// Tracks which preview handles are still outstanding.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoded original and hand out its handle.
    pub fn acquire(&self, image: DynamicImage) -> PreviewHandle {
        let mut inner = self.inner.lock();
        let key = inner.next_key;
        inner.next_key += 1;
        inner.live.insert(key);
        PreviewHandle {
            key,
            image: Arc::new(image),
            registry: self.clone(),
        }
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    fn release(&self, key: u64) -> bool {
        self.inner.lock().live.remove(&key)
    }
}

/// Scoped reference to a displayable original. Released on drop.
pub struct PreviewHandle {
    key: u64,
    image: Arc<DynamicImage>,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    /// Shared pixels of the original.
    ///
    /// The returned `Arc` keeps the pixels alive for an in-flight pipeline
    /// even after the handle itself has been released.
    pub fn image(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let released = self.registry.release(self.key);
        debug_assert!(released, "preview handle {} released twice", self.key);
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("key", &self.key)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}
