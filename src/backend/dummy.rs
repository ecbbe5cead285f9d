//! Recording backend.
//!
//! Performs no GPU work. Resource creation hands back ids, data transfers
//! are counted and logged. Useful for headless tests and tools that need
//! the full resource pipeline without a device.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Uniform offset alignment the recording backend reports.
///
/// 256 is the worst case among desktop GPUs, so data laid out for the
/// recording backend stays valid on real hardware.
pub const DUMMY_UNIFORM_ALIGNMENT: u64 = 256;

/// Backend that records resource traffic instead of submitting it.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: AtomicU32,
    bytes_written: AtomicU64,
}

impl DummyBackend {
    /// Create a new recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend name for logging.
    pub fn name(&self) -> &'static str {
        "dummy"
    }

    /// Uniform buffer offset alignment.
    pub fn uniform_alignment(&self) -> u64 {
        DUMMY_UNIFORM_ALIGNMENT
    }

    /// Allocate the next resource id.
    pub fn next_resource_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a buffer write.
    pub fn write_buffer(&self, buffer_id: u32, offset: u64, data: &[u8]) {
        log::trace!(
            "dummy write_buffer id={} offset={} len={}",
            buffer_id,
            offset,
            data.len()
        );
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    /// Record a texture upload.
    pub fn write_texture(&self, texture_id: u32, data: &[u8]) {
        log::trace!("dummy write_texture id={} len={}", texture_id, data.len());
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    /// Total bytes transferred since creation.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_allocation_is_unique() {
        let backend = DummyBackend::new();
        let a = backend.next_resource_id();
        let b = backend.next_resource_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_write_accounting() {
        let backend = DummyBackend::new();
        backend.write_buffer(0, 0, &[0u8; 64]);
        backend.write_texture(1, &[0u8; 16]);
        assert_eq!(backend.bytes_written(), 80);
    }
}
