//! Pre-allocated scratch buffers with scoped borrow handles.
//!
//! The per-tick signal pass needs short-lived float regions: input snapshots
//! for filter arrays, private mix buses for per-oscillator effect chains,
//! rate-converted copies for pluggable processors. A [`ScratchPool`] owns a
//! fixed number of regions; [`ScratchPool::acquire`] hands out an exclusive
//! [`ScratchBuffer`] that returns its region on drop, including early exits
//! through `?`.
//!
//! ```rust
//! use cadenza_core::ScratchPool;
//!
//! let pool = ScratchPool::new(2, 64);
//! {
//!     let mut a = pool.acquire(64).unwrap();
//!     let b = pool.acquire(32).unwrap();
//!     a[0] = 1.0;
//!     assert_eq!(b.len(), 32);
//!     assert!(pool.acquire(16).is_none());
//! }
//! assert_eq!(pool.available(), 2);
//! ```

use core::cell::{RefCell, RefMut};
use core::ops::{Deref, DerefMut};

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Fixed set of reusable `f32` regions.
#[derive(Debug)]
pub struct ScratchPool {
    slots: Vec<RefCell<Vec<f32>>>,
    block_len: usize,
}

impl ScratchPool {
    /// Allocates `slots` regions of `block_len` samples each.
    pub fn new(slots: usize, block_len: usize) -> Self {
        Self {
            slots: (0..slots).map(|_| RefCell::new(vec![0.0; block_len])).collect(),
            block_len,
        }
    }

    /// Length every region was allocated with.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Total number of regions.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Regions not currently borrowed.
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.try_borrow_mut().is_ok()).count()
    }

    /// Borrows a free region of `len` zeroed samples.
    ///
    /// Returns `None` when every region is in use. A `len` larger than the
    /// allocation grows that region once.
    pub fn acquire(&self, len: usize) -> Option<ScratchBuffer<'_>> {
        let Some(mut region) = self.slots.iter().find_map(|slot| slot.try_borrow_mut().ok()) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(capacity = self.slots.len(), "scratch pool exhausted");
            return None;
        };
        if region.len() < len {
            region.resize(len, 0.0);
        }
        region[..len].fill(0.0);
        Some(ScratchBuffer { region, len })
    }
}

/// Exclusive borrow of one scratch region.
///
/// Dereferences to a `[f32]` of the requested length.
pub struct ScratchBuffer<'a> {
    region: RefMut<'a, Vec<f32>>,
    len: usize,
}

impl Deref for ScratchBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.region[..self.len]
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.region[..self.len]
    }
}

impl core::fmt::Debug for ScratchBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScratchBuffer").field("len", &self.len).finish()
    }
}
