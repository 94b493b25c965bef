//! Calling signatures and hooks.
//!
//! A signature describes a callable boundary: ordered arguments, an
//! optional return value, variadicity, and presentation details. Hooks
//! bridge signatures into a particular function's IR by exposing cloned
//! terms for each argument and for the return value, so the generator can
//! address those values with ordinary expression lowering.

use std::collections::HashMap;

use crate::statement::StmtId;
use crate::term::TermId;
use crate::types::IrType;

/// Unique identifier for a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignatureId(pub u32);

/// An argument or return value of a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignatureValue {
    /// The declared type.
    pub ty: IrType,
}

impl SignatureValue {
    /// Creates a signature value of the given type.
    pub fn new(ty: IrType) -> Self {
        Self { ty }
    }
}

/// A resolved calling signature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Comment carried into the output.
    pub comment: Option<String>,
    /// True for variadic callables.
    pub variadic: bool,
    /// Ordered formal arguments.
    pub arguments: Vec<SignatureValue>,
    /// The return value, if the callable produces one.
    pub return_value: Option<SignatureValue>,
}

impl Signature {
    /// Creates a signature with no arguments and no return value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            variadic: false,
            arguments: Vec::new(),
            return_value: None,
        }
    }
}

/// The signature database.
#[derive(Debug, Clone, Default)]
pub struct Signatures {
    sigs: Vec<Signature>,
    by_function_name: HashMap<String, SignatureId>,
    by_address: HashMap<u64, SignatureId>,
    by_call: HashMap<StmtId, SignatureId>,
}

impl Signatures {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signature and returns its id.
    pub fn add(&mut self, sig: Signature) -> SignatureId {
        let id = SignatureId(self.sigs.len() as u32);
        self.sigs.push(sig);
        id
    }

    /// Binds a signature to a function by name.
    pub fn bind_function(&mut self, name: impl Into<String>, id: SignatureId) {
        self.by_function_name.insert(name.into(), id);
    }

    /// Binds a signature to a callee address.
    pub fn bind_address(&mut self, address: u64, id: SignatureId) {
        self.by_address.insert(address, id);
    }

    /// Binds a signature to a call site.
    pub fn bind_call(&mut self, call: StmtId, id: SignatureId) {
        self.by_call.insert(call, id);
    }

    /// Returns a signature by id.
    pub fn get(&self, id: SignatureId) -> &Signature {
        &self.sigs[id.0 as usize]
    }

    /// The signature of a function, by name.
    pub fn of_function(&self, name: &str) -> Option<&Signature> {
        self.by_function_name.get(name).map(|id| self.get(*id))
    }

    /// The signature of a callee at a concrete address.
    pub fn of_address(&self, address: u64) -> Option<&Signature> {
        self.by_address.get(&address).map(|id| self.get(*id))
    }

    /// The signature resolved for a call site.
    pub fn of_call(&self, call: StmtId) -> Option<&Signature> {
        self.by_call.get(&call).map(|id| self.get(*id))
    }
}

/// Cloned argument terms at a function's entry.
#[derive(Debug, Clone, Default)]
pub struct EntryHook {
    /// One term per signature argument, in signature order.
    pub argument_terms: Vec<TermId>,
}

/// Cloned argument and return-value terms at a call site.
#[derive(Debug, Clone, Default)]
pub struct CallHook {
    /// One term per call-signature argument, in signature order.
    pub argument_terms: Vec<TermId>,
    /// The term naming the returned value, when the callee returns one.
    pub return_value_term: Option<TermId>,
}

/// The cloned return-value term at a return site.
#[derive(Debug, Clone)]
pub struct ReturnHook {
    /// The term naming the value being returned.
    pub return_value_term: TermId,
}

/// Hooks of one function.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    entry: Option<EntryHook>,
    calls: HashMap<StmtId, CallHook>,
    returns: HashMap<StmtId, ReturnHook>,
}

impl Hooks {
    /// Creates an empty hook table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the entry hook.
    pub fn set_entry(&mut self, hook: EntryHook) {
        self.entry = Some(hook);
    }

    /// The entry hook, if installed.
    pub fn entry(&self) -> Option<&EntryHook> {
        self.entry.as_ref()
    }

    /// Installs the call hook of a call site.
    pub fn set_call_hook(&mut self, call: StmtId, hook: CallHook) {
        self.calls.insert(call, hook);
    }

    /// The call hook of a call site, if installed.
    pub fn call_hook(&self, call: StmtId) -> Option<&CallHook> {
        self.calls.get(&call)
    }

    /// Installs the return hook of a return site.
    pub fn set_return_hook(&mut self, ret: StmtId, hook: ReturnHook) {
        self.returns.insert(ret, hook);
    }

    /// The return hook of a return site, if installed.
    pub fn return_hook(&self, ret: StmtId) -> Option<&ReturnHook> {
        self.returns.get(&ret)
    }
}
