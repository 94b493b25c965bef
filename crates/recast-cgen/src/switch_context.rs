//! Switch-body generation state.

use std::collections::BTreeMap;

use recast_ir::BasicBlockId;

use crate::ast::CType;

/// State threaded through the walk of a switch body.
///
/// Maps basic-block addresses to the case values that must label them, and
/// remembers the default block and the switch's value type. Outside any
/// switch the context is empty and contributes nothing.
///
/// The address map is ordered so that trailing synthetic `goto`s for
/// unmatched entries come out in a deterministic order.
#[derive(Debug, Clone)]
pub struct SwitchContext {
    value_type: CType,
    case_values: BTreeMap<u64, Vec<i64>>,
    default_block: Option<BasicBlockId>,
}

impl Default for SwitchContext {
    fn default() -> Self {
        Self {
            value_type: CType::Void,
            case_values: BTreeMap::new(),
            default_block: None,
        }
    }
}

impl SwitchContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the type used for case-label constants.
    pub fn set_value_type(&mut self, ty: CType) {
        self.value_type = ty;
    }

    /// The type used for case-label constants.
    pub fn value_type(&self) -> &CType {
        &self.value_type
    }

    /// Registers a case value for a target address.
    pub fn add_case_value(&mut self, address: u64, value: i64) {
        self.case_values.entry(address).or_default().push(value);
    }

    /// The case values registered for an address.
    pub fn case_values(&self, address: u64) -> &[i64] {
        self.case_values
            .get(&address)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Consumes the case values of an address once they have been emitted.
    pub fn erase_case_values(&mut self, address: u64) {
        self.case_values.remove(&address);
    }

    /// Sets the default target block.
    pub fn set_default_block(&mut self, bb: BasicBlockId) {
        self.default_block = Some(bb);
    }

    /// The default target block, if any.
    pub fn default_block(&self) -> Option<BasicBlockId> {
        self.default_block
    }

    /// Drains the addresses whose labels were never emitted, in address
    /// order. These become `case v: goto <addr>;` trailers.
    pub fn take_remaining(&mut self) -> Vec<(u64, Vec<i64>)> {
        std::mem::take(&mut self.case_values).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_values_accumulate_and_erase() {
        let mut ctx = SwitchContext::new();
        ctx.add_case_value(0x100, 0);
        ctx.add_case_value(0x100, 2);
        ctx.add_case_value(0x200, 1);

        assert_eq!(ctx.case_values(0x100), &[0, 2]);
        ctx.erase_case_values(0x100);
        assert_eq!(ctx.case_values(0x100), &[] as &[i64]);
        assert_eq!(ctx.case_values(0x200), &[1]);
    }

    #[test]
    fn test_take_remaining_is_address_ordered() {
        let mut ctx = SwitchContext::new();
        ctx.add_case_value(0x300, 3);
        ctx.add_case_value(0x100, 1);
        ctx.add_case_value(0x200, 2);

        let remaining = ctx.take_remaining();
        let addrs: Vec<u64> = remaining.iter().map(|(a, _)| *a).collect();
        assert_eq!(addrs, vec![0x100, 0x200, 0x300]);
        assert!(ctx.take_remaining().is_empty());
    }
}
