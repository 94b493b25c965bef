//! Term types.
//!
//! Type reconstruction runs upstream; the generator only needs each term's
//! bit size, signedness, and pointee (for pointer-typed constants and
//! dereferences).

use std::collections::HashMap;

use crate::term::TermId;

/// The reconstructed type of a term.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IrType {
    /// Size in bits.
    pub size: u16,
    /// True when the value is interpreted as unsigned.
    pub unsigned: bool,
    /// The pointed-to type, when this is a pointer.
    pub pointee: Option<Box<IrType>>,
}

impl IrType {
    /// An integer type.
    pub fn int(size: u16, unsigned: bool) -> Self {
        Self {
            size,
            unsigned,
            pointee: None,
        }
    }

    /// A pointer type of the given size.
    pub fn pointer(size: u16, pointee: IrType) -> Self {
        Self {
            size,
            unsigned: true,
            pointee: Some(Box::new(pointee)),
        }
    }

    /// The pointee type, when this is a pointer.
    pub fn pointee(&self) -> Option<&IrType> {
        self.pointee.as_deref()
    }
}

/// Per-function term types.
#[derive(Debug, Clone, Default)]
pub struct Types {
    map: HashMap<TermId, IrType>,
}

impl Types {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a term's type.
    pub fn set(&mut self, term: TermId, ty: IrType) {
        self.map.insert(term, ty);
    }

    /// Returns a term's recorded type, if any.
    ///
    /// Callers fall back to an unsigned integer of the term's bit size
    /// when no annotation exists.
    pub fn get(&self, term: TermId) -> Option<&IrType> {
        self.map.get(&term)
    }
}
