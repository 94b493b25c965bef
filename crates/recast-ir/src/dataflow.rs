//! Data flow facts consumed by the code generator.
//!
//! The dataflow fix point itself runs upstream; this module stores its
//! per-term results: memory locations, abstract values, and reaching
//! definitions.

use std::collections::HashMap;

use crate::location::{bit_mask, MemoryLocation, SizedValue};
use crate::term::TermId;

/// A bitwise three-valued approximation of a runtime value.
///
/// Each bit position carries two flags: "can be zero" and "can be one".
/// A value is concrete when every bit has exactly one flag set; the
/// one-bits then spell the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbstractValue {
    size: u16,
    zero_bits: u64,
    one_bits: u64,
}

impl AbstractValue {
    /// Creates an abstract value from raw bit masks, truncated to `size`.
    pub fn new(size: u16, zero_bits: u64, one_bits: u64) -> Self {
        Self {
            size,
            zero_bits: zero_bits & bit_mask(size),
            one_bits: one_bits & bit_mask(size),
        }
    }

    /// The abstraction of a known constant.
    pub fn concrete(value: SizedValue) -> Self {
        let size = value.size();
        Self {
            size,
            zero_bits: !value.value() & bit_mask(size),
            one_bits: value.value(),
        }
    }

    /// The abstraction that knows nothing: every bit can be either.
    pub fn top(size: u16) -> Self {
        Self {
            size,
            zero_bits: bit_mask(size),
            one_bits: bit_mask(size),
        }
    }

    /// Size in bits.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Mask of positions that can be zero.
    pub fn zero_bits(&self) -> u64 {
        self.zero_bits
    }

    /// Mask of positions that can be one.
    pub fn one_bits(&self) -> u64 {
        self.one_bits
    }

    /// True when every bit is definitely zero or definitely one.
    pub fn is_concrete(&self) -> bool {
        self.size > 0 && (self.zero_bits ^ self.one_bits) == bit_mask(self.size)
    }

    /// The concrete value. Meaningless unless [`Self::is_concrete`] holds.
    pub fn as_concrete(&self) -> SizedValue {
        debug_assert!(self.is_concrete());
        SizedValue::new(self.size, self.one_bits)
    }

    /// Joins two approximations of the same quantity.
    pub fn merge(&self, other: &AbstractValue) -> AbstractValue {
        AbstractValue::new(
            self.size,
            self.zero_bits | other.zero_bits,
            self.one_bits | other.one_bits,
        )
    }
}

/// The dataflow value attached to a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Value {
    abstract_value: AbstractValue,
}

impl Value {
    /// Wraps an abstract value.
    pub fn new(abstract_value: AbstractValue) -> Self {
        Self { abstract_value }
    }

    /// The abstract value.
    pub fn abstract_value(&self) -> &AbstractValue {
        &self.abstract_value
    }
}

/// Per-function dataflow facts.
#[derive(Debug, Clone, Default)]
pub struct Dataflow {
    locations: HashMap<TermId, MemoryLocation>,
    values: HashMap<TermId, Value>,
    definitions: HashMap<TermId, Vec<TermId>>,
}

impl Dataflow {
    /// Creates an empty fact table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a memory location to a term.
    pub fn set_memory_location(&mut self, term: TermId, location: MemoryLocation) {
        self.locations.insert(term, location);
    }

    /// The memory location assigned to a term, if any.
    pub fn memory_location(&self, term: TermId) -> Option<&MemoryLocation> {
        self.locations.get(&term)
    }

    /// Records the abstract value of a term.
    pub fn set_value(&mut self, term: TermId, value: AbstractValue) {
        self.values.insert(term, Value::new(value));
    }

    /// The dataflow value of a term, if one was computed.
    pub fn value(&self, term: TermId) -> Option<&Value> {
        self.values.get(&term)
    }

    /// Records a definition reaching a read.
    pub fn add_definition(&mut self, read: TermId, def: TermId) {
        self.definitions.entry(read).or_default().push(def);
    }

    /// The definitions reaching a read. Empty when none were recorded.
    pub fn definitions(&self, read: TermId) -> &[TermId] {
        self.definitions.get(&read).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_round_trip() {
        let v = AbstractValue::concrete(SizedValue::new(16, 0xbeef));
        assert!(v.is_concrete());
        assert_eq!(v.as_concrete(), SizedValue::new(16, 0xbeef));
    }

    #[test]
    fn test_top_is_not_concrete() {
        assert!(!AbstractValue::top(32).is_concrete());
        assert!(!AbstractValue::new(0, 0, 0).is_concrete());
    }

    #[test]
    fn test_merge_loses_disagreeing_bits() {
        let a = AbstractValue::concrete(SizedValue::new(8, 0b0011));
        let b = AbstractValue::concrete(SizedValue::new(8, 0b0101));
        let m = a.merge(&b);
        assert!(!m.is_concrete());
        // Bits where both agree stay known.
        assert_eq!(m.one_bits() & 0b0001, 0b0001);
        assert_eq!(m.zero_bits() & 0b1000, 0b1000);
    }
}
