//! Sub-allocating arena over a single device buffer.

use std::sync::Arc;

use crate::backend::{Buffer, RenderDevice};
use crate::error::RenderError;
use crate::memory::align_up;
use crate::types::{BufferDescriptor, BufferUsage};

/// A sub-range of an arena's buffer.
///
/// Offsets are absolute within the backing buffer and already aligned to the
/// arena's alignment. The allocation stays valid until it is passed back to
/// [`DeviceMemoryArena::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaAllocation {
    /// Byte offset within the arena's buffer.
    pub offset: u64,
    /// Allocated size in bytes (rounded up to the arena alignment).
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    offset: u64,
    size: u64,
}

/// First-fit sub-allocator over one device buffer with a CPU staging copy.
///
/// Writes go to the staging copy through [`set_data`] and reach the device
/// only on [`sync`], so several small writes to one allocation cost one
/// transfer. Freed ranges are coalesced with their neighbors and reused.
///
/// [`set_data`]: DeviceMemoryArena::set_data
/// [`sync`]: DeviceMemoryArena::sync
#[derive(Debug)]
pub struct DeviceMemoryArena {
    label: &'static str,
    device: Arc<RenderDevice>,
    buffer: Arc<Buffer>,
    staging: Vec<u8>,
    capacity: u64,
    alignment: u64,
    free_list: Vec<FreeBlock>,
    high_water_mark: u64,
}

impl DeviceMemoryArena {
    /// Create an arena of `capacity` bytes with the given offset alignment.
    ///
    /// `alignment` must be a power of two; uniform arenas pass the device's
    /// [`uniform_alignment`](RenderDevice::uniform_alignment).
    pub fn new(
        device: Arc<RenderDevice>,
        label: &'static str,
        capacity: u64,
        alignment: u64,
        usage: BufferUsage,
    ) -> Result<Self, RenderError> {
        if !alignment.is_power_of_two() {
            return Err(RenderError::InvalidParameter(format!(
                "arena '{label}' alignment {alignment} is not a power of two"
            )));
        }
        let capacity = align_up(capacity, alignment);
        let buffer = device.create_buffer(
            BufferDescriptor::new(capacity, usage | BufferUsage::COPY_DST).with_label(label),
        )?;
        log::trace!("arena '{label}' created, capacity={capacity} alignment={alignment}");
        Ok(Self {
            label,
            device,
            buffer,
            staging: vec![0; capacity as usize],
            capacity,
            alignment,
            free_list: vec![FreeBlock {
                offset: 0,
                size: capacity,
            }],
            high_water_mark: 0,
        })
    }

    /// The backing device buffer.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently unallocated, summed across free blocks.
    pub fn available(&self) -> u64 {
        self.free_list.iter().map(|b| b.size).sum()
    }

    /// Highest buffer offset ever reached by an allocation.
    ///
    /// Stable allocate/free cycles keep this flat; a creeping mark means
    /// freed ranges are not being reused.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }

    /// Allocate `size` bytes.
    ///
    /// The request is rounded up to the arena alignment and placed in the
    /// lowest-offset free block that fits. Exhaustion is fatal.
    pub fn alloc(&mut self, size: u64) -> Result<ArenaAllocation, RenderError> {
        if size == 0 {
            return Err(RenderError::InvalidParameter(format!(
                "zero-sized allocation in arena '{}'",
                self.label
            )));
        }
        let size = align_up(size, self.alignment);
        let slot = self.free_list.iter().position(|b| b.size >= size);
        let Some(slot) = slot else {
            return Err(RenderError::ArenaExhausted {
                arena: self.label,
                requested: size,
                available: self.available(),
                capacity: self.capacity,
            });
        };

        let block = &mut self.free_list[slot];
        let offset = block.offset;
        if block.size == size {
            self.free_list.remove(slot);
        } else {
            block.offset += size;
            block.size -= size;
        }
        self.high_water_mark = self.high_water_mark.max(offset + size);
        log::trace!("arena '{}' alloc offset={offset} size={size}", self.label);
        Ok(ArenaAllocation { offset, size })
    }

    /// Return an allocation to the arena.
    ///
    /// The freed range is merged with adjacent free blocks. Freeing a range
    /// that overlaps a free block is a programming error and panics in debug
    /// builds.
    pub fn free(&mut self, allocation: ArenaAllocation) {
        debug_assert!(
            allocation.offset + allocation.size <= self.capacity,
            "allocation outside arena '{}'",
            self.label
        );
        let insert_at = self
            .free_list
            .partition_point(|b| b.offset < allocation.offset);
        debug_assert!(
            insert_at >= self.free_list.len()
                || allocation.offset + allocation.size <= self.free_list[insert_at].offset,
            "double free in arena '{}'",
            self.label
        );
        debug_assert!(
            insert_at == 0
                || self.free_list[insert_at - 1].offset + self.free_list[insert_at - 1].size
                    <= allocation.offset,
            "double free in arena '{}'",
            self.label
        );

        self.free_list.insert(
            insert_at,
            FreeBlock {
                offset: allocation.offset,
                size: allocation.size,
            },
        );
        // Merge with the following block, then the preceding one.
        if insert_at + 1 < self.free_list.len() {
            let next = self.free_list[insert_at + 1];
            let cur = self.free_list[insert_at];
            if cur.offset + cur.size == next.offset {
                self.free_list[insert_at].size += next.size;
                self.free_list.remove(insert_at + 1);
            }
        }
        if insert_at > 0 {
            let prev = self.free_list[insert_at - 1];
            let cur = self.free_list[insert_at];
            if prev.offset + prev.size == cur.offset {
                self.free_list[insert_at - 1].size += cur.size;
                self.free_list.remove(insert_at);
            }
        }
        log::trace!(
            "arena '{}' free offset={} size={}",
            self.label,
            allocation.offset,
            allocation.size
        );
    }

    /// Write `data` into the staging copy at `offset` bytes into `allocation`.
    ///
    /// Writing past the end of the allocation panics in debug builds.
    pub fn set_data(&mut self, allocation: ArenaAllocation, offset: u64, data: &[u8]) {
        debug_assert!(
            offset + data.len() as u64 <= allocation.size,
            "write past end of allocation in arena '{}': offset {} + len {} > size {}",
            self.label,
            offset,
            data.len(),
            allocation.size
        );
        let start = (allocation.offset + offset) as usize;
        self.staging[start..start + data.len()].copy_from_slice(data);
    }

    /// Upload the staging bytes of `allocation` to the device buffer.
    pub fn sync(&self, allocation: ArenaAllocation) {
        let start = allocation.offset as usize;
        let end = (allocation.offset + allocation.size) as usize;
        self.device
            .write_buffer(&self.buffer, allocation.offset, &self.staging[start..end]);
    }

    /// Read back the staging bytes of `allocation`, for tests and tools.
    pub fn staging_bytes(&self, allocation: ArenaAllocation) -> &[u8] {
        let start = allocation.offset as usize;
        let end = (allocation.offset + allocation.size) as usize;
        &self.staging[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_arena(capacity: u64, alignment: u64) -> DeviceMemoryArena {
        let device = RenderDevice::new();
        DeviceMemoryArena::new(device, "test", capacity, alignment, BufferUsage::VERTEX).unwrap()
    }

    #[test]
    fn test_alloc_aligns_offsets() {
        let mut arena = create_test_arena(4096, 256);
        let a = arena.alloc(20).unwrap();
        let b = arena.alloc(20).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.size, 256);
        assert_eq!(b.offset, 256);
    }

    #[test]
    fn test_free_then_alloc_reuses_space() {
        let mut arena = create_test_arena(4096, 256);
        let a = arena.alloc(256).unwrap();
        let _b = arena.alloc(256).unwrap();
        arena.free(a);
        let c = arena.alloc(256).unwrap();
        assert_eq!(c.offset, 0);
    }

    #[test]
    fn test_stable_churn_keeps_high_water_mark_flat() {
        let mut arena = create_test_arena(16 * 1024, 256);
        let mut live = Vec::new();
        for _ in 0..8 {
            live.push(arena.alloc(512).unwrap());
        }
        let mark = arena.high_water_mark();
        for _ in 0..100 {
            arena.free(live.remove(0));
            live.push(arena.alloc(512).unwrap());
        }
        assert_eq!(arena.high_water_mark(), mark);
    }

    #[test]
    fn test_free_coalesces_neighbors() {
        let mut arena = create_test_arena(1024, 256);
        let a = arena.alloc(256).unwrap();
        let b = arena.alloc(256).unwrap();
        let c = arena.alloc(256).unwrap();
        let _d = arena.alloc(256).unwrap();
        arena.free(a);
        arena.free(c);
        arena.free(b);
        // All three ranges merged back into one block.
        let merged = arena.alloc(768).unwrap();
        assert_eq!(merged.offset, 0);
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let mut arena = create_test_arena(1024, 256);
        let _a = arena.alloc(1024).unwrap();
        let err = arena.alloc(1).unwrap_err();
        assert!(matches!(err, RenderError::ArenaExhausted { .. }));
    }

    #[test]
    fn test_set_data_and_sync() {
        let mut arena = create_test_arena(1024, 256);
        let a = arena.alloc(16).unwrap();
        arena.set_data(a, 0, &[1, 2, 3, 4]);
        arena.set_data(a, 4, &[5, 6]);
        assert_eq!(&arena.staging_bytes(a)[..6], &[1, 2, 3, 4, 5, 6]);
        arena.sync(a);
    }
}
