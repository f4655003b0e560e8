use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::blurring::infrastructure::gpu_image::texture_descriptor;
use crate::shared::error::ResourceError;

/// Dimensions and usage of a shared output image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedBufferDesc {
    pub width: u32,
    pub height: u32,
}

impl SharedBufferDesc {
    /// Usage every shared output needs: written by copy, sampled or
    /// copied out by the consumer.
    pub fn usage(&self) -> wgpu::TextureUsages {
        wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::TEXTURE_BINDING
    }
}

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

struct SharedBufferInner {
    id: u64,
    texture: wgpu::Texture,
    released: AtomicBool,
}

/// Reference to a slot's output image that other consumers of the same
/// device can sample without a copy.
///
/// Cloning is cheap; every clone sees the same image. Once the owning slot
/// is released `is_released` turns true and the texture must not be used.
#[derive(Clone)]
pub struct SharedOutputHandle {
    inner: Arc<SharedBufferInner>,
}

impl SharedOutputHandle {
    pub fn new(texture: wgpu::Texture) -> Self {
        Self {
            inner: Arc::new(SharedBufferInner {
                id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
                texture,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique id of the underlying buffer. Stable across blurs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.inner.texture
    }

    pub fn width(&self) -> u32 {
        self.inner.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.texture.height()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Marks the handle released. Returns false if it already was.
    fn mark_released(&self) -> bool {
        !self.inner.released.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for SharedOutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedOutputHandle")
            .field("id", &self.id())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("released", &self.is_released())
            .finish()
    }
}

impl PartialEq for SharedOutputHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Allocates and releases the shared output images of resource slots.
pub trait SharedBufferAllocator: Send + Sync {
    fn allocate(
        &self,
        device: &wgpu::Device,
        desc: &SharedBufferDesc,
    ) -> Result<SharedOutputHandle, ResourceError>;

    /// Destroy the backing memory. Called exactly once per handle.
    fn release(&self, handle: &SharedOutputHandle);
}

/// Default allocator: a plain device texture shared within one device.
///
/// The handle is only usable by consumers of the same `wgpu::Device`; it
/// never fails with `ResourceError::Export`. Exporting to another process
/// or a system compositor is done by plugging a platform-specific
/// `SharedBufferAllocator` into `GpuImageProcessor::with_allocator`.
#[derive(Debug, Default)]
pub struct DeviceSharedAllocator;

impl SharedBufferAllocator for DeviceSharedAllocator {
    fn allocate(
        &self,
        device: &wgpu::Device,
        desc: &SharedBufferDesc,
    ) -> Result<SharedOutputHandle, ResourceError> {
        let texture = device.create_texture(&texture_descriptor(
            "shared-output",
            desc.width,
            desc.height,
            desc.usage(),
        ));
        Ok(SharedOutputHandle::new(texture))
    }

    fn release(&self, handle: &SharedOutputHandle) {
        handle.texture().destroy();
    }
}

/// Release `handle` through `allocator` unless that already happened.
pub fn release_shared(allocator: &dyn SharedBufferAllocator, handle: &SharedOutputHandle) {
    if handle.mark_released() {
        allocator.release(handle);
    }
}
