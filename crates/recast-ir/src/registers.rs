//! Architecture register map.
//!
//! The generator optionally names local variables after the register that
//! backs them; this map answers "which register covers this location".

use crate::location::MemoryLocation;

/// A named architecture register and the location it occupies.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// Canonical register name, e.g. `RAX` or `w0`.
    pub name: String,
    /// The register's slot in the register domain.
    pub location: MemoryLocation,
}

/// The register file of the target architecture.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterMap {
    registers: Vec<Register>,
}

impl RegisterMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a register.
    pub fn add(&mut self, name: impl Into<String>, location: MemoryLocation) {
        self.registers.push(Register {
            name: name.into(),
            location,
        });
    }

    /// The first register whose location covers the given one.
    pub fn covering(&self, location: &MemoryLocation) -> Option<&Register> {
        self.registers.iter().find(|r| r.location.covers(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MemoryDomain;

    #[test]
    fn test_covering_finds_enclosing_register() {
        let mut map = RegisterMap::new();
        map.add("RAX", MemoryLocation::new(MemoryDomain::Registers, 0, 64));
        map.add("RBX", MemoryLocation::new(MemoryDomain::Registers, 64, 64));

        let eax = MemoryLocation::new(MemoryDomain::Registers, 0, 32);
        assert_eq!(map.covering(&eax).map(|r| r.name.as_str()), Some("RAX"));

        let elsewhere = MemoryLocation::new(MemoryDomain::Registers, 256, 32);
        assert!(map.covering(&elsewhere).is_none());
    }
}
