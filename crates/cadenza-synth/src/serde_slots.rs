//! Serde form of fixed arrays of optional slots.
//!
//! `[Option<T>; N]` is written as a list of the filled slots only, each
//! tagged with its 1-based `release` number. TOML has no null, so the plain
//! array form cannot be stored there.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize)]
struct SlotRef<'a, T> {
    release: usize,
    #[serde(flatten)]
    value: &'a T,
}

#[derive(Deserialize)]
struct Slot<T> {
    release: usize,
    #[serde(flatten)]
    value: T,
}

pub(crate) fn serialize<S, T, const N: usize>(
    slots: &[Option<T>; N],
    serializer: S,
) -> core::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let filled: Vec<SlotRef<'_, T>> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|value| SlotRef { release: i + 1, value }))
        .collect();
    filled.serialize(serializer)
}

pub(crate) fn deserialize<'de, D, T, const N: usize>(
    deserializer: D,
) -> core::result::Result<[Option<T>; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Copy,
{
    let mut slots = [None; N];
    for slot in Vec::<Slot<T>>::deserialize(deserializer)? {
        let index = slot
            .release
            .checked_sub(1)
            .filter(|&i| i < N)
            .ok_or_else(|| D::Error::custom(format_args!("release {} outside 1..={N}", slot.release)))?;
        slots[index] = Some(slot.value);
    }
    Ok(slots)
}
