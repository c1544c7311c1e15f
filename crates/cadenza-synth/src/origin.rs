//! Two-stage construction for pre-origin alignment.
//!
//! A note's nominal start is its *origin*. Some components need lead-in
//! ticks before the origin (an envelope whose origin sits after an attack
//! phase, an LFO whose frequency envelope does). How far each component must
//! be delayed depends on the largest lead-in among all siblings, which is
//! only known once every sibling exists.
//!
//! Constructors therefore return a [`Staged`] component carrying its own
//! lead-in. The owner collects the maximum and calls [`Staged::align`],
//! which delays the component so that every sibling reaches its origin on
//! the same tick.

/// A component whose start can be delayed to line up origins.
pub trait OriginAligned {
    /// Ticks this component runs before reaching its origin.
    fn pre_origin_ticks(&self) -> u32;

    /// Delays the component so its origin lands `max_pre_origin` ticks after
    /// the first update.
    fn fix_origin(&mut self, max_pre_origin: u32);
}

/// A constructed component that has not yet been aligned.
#[derive(Debug, Clone)]
#[must_use = "a staged component must be aligned before use"]
pub struct Staged<T> {
    component: T,
}

impl<T: OriginAligned> Staged<T> {
    /// Wraps a freshly constructed component.
    pub fn new(component: T) -> Self {
        Self { component }
    }

    /// Lead-in ticks needed before the origin.
    pub fn pre_origin_ticks(&self) -> u32 {
        self.component.pre_origin_ticks()
    }

    /// Aligns the component against the siblings' maximum lead-in.
    pub fn align(mut self, max_pre_origin: u32) -> T {
        self.component.fix_origin(max_pre_origin);
        self.component
    }

    /// Unwraps without aligning, for a parent that forwards alignment to its
    /// children from its own [`OriginAligned::fix_origin`].
    pub fn into_child(self) -> T {
        self.component
    }
}
