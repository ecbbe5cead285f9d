//! Shadow atlas slot allocation.

use fixedbitset::FixedBitSet;

/// Allocates contiguous runs of shadow atlas slots.
///
/// Reservations live for one frame: the frame driver calls [`reset`] before
/// re-allocating slots to the active lights. Exhaustion is a recoverable
/// degradation signalled with `None`; the caller skips shadow rendering for
/// that light.
///
/// [`reset`]: ShadowSlotAllocator::reset
#[derive(Debug)]
pub struct ShadowSlotAllocator {
    reserved: FixedBitSet,
}

impl ShadowSlotAllocator {
    /// Create an allocator over `capacity` atlas slots.
    pub fn new(capacity: u32) -> Self {
        Self {
            reserved: FixedBitSet::with_capacity(capacity as usize),
        }
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> u32 {
        self.reserved.len() as u32
    }

    /// Number of slots currently reserved.
    pub fn reserved_count(&self) -> u32 {
        self.reserved.count_ones(..) as u32
    }

    /// Reserve `count` contiguous slots, returning the first slot index.
    ///
    /// First-fit scan; a probe hitting a reserved slot skips the whole probed
    /// window. Returns `None` when no free run of `count` slots exists.
    pub fn allocate(&mut self, count: u32) -> Option<u32> {
        let count = count as usize;
        let capacity = self.reserved.len();
        if count == 0 || count > capacity {
            return None;
        }
        let mut i = 0;
        while i + count <= capacity {
            let mut occupied = None;
            for probe in (i..i + count).rev() {
                if self.reserved.contains(probe) {
                    occupied = Some(probe);
                    break;
                }
            }
            match occupied {
                Some(probe) => i = probe + 1,
                None => {
                    self.reserved.set_range(i..i + count, true);
                    log::trace!("shadow slots [{i}, {}) reserved", i + count);
                    return Some(i as u32);
                }
            }
        }
        log::warn!(
            "shadow atlas exhausted: no run of {count} free slots in {capacity}"
        );
        None
    }

    /// Release `count` slots starting at `start`.
    ///
    /// Every slot in the range must currently be reserved; releasing an
    /// unreserved slot panics.
    pub fn free(&mut self, start: u32, count: u32) {
        let start = start as usize;
        let count = count as usize;
        assert!(start + count <= self.reserved.len());
        for slot in start..start + count {
            assert!(
                self.reserved.contains(slot),
                "freeing unreserved shadow slot {slot}"
            );
            self.reserved.set(slot, false);
        }
    }

    /// Clear every reservation. Called once per frame.
    pub fn reset(&mut self) {
        self.reserved.clear();
    }
}
