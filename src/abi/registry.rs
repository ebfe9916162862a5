//! Selector → function signature registry.
//!
//! Built once from the target contract's ABI. Read-only functions (view and
//! pure) are excluded since they can never be the payload of a proposal.

use std::collections::HashMap;
use std::path::Path;

use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{keccak256, Selector};

use super::error::AbiError;
use super::input::InputSpec;

/// A callable function: name plus ordered input tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub selector: Selector,
    pub name: String,
    pub inputs: Vec<InputSpec>,
}

impl FunctionSignature {
    /// Derive the signature (and its selector) from a name and input tree.
    pub fn new(name: impl Into<String>, inputs: Vec<InputSpec>) -> Self {
        let name = name.into();
        let selector = compute_selector(&name, &inputs);
        Self {
            selector,
            name,
            inputs,
        }
    }

    fn from_function(function: &Function) -> Result<Self, String> {
        let inputs = function
            .inputs
            .iter()
            .map(InputSpec::from_param)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(function.name.clone(), inputs))
    }

    /// e.g. "transfer(address,uint256)"
    pub fn canonical_signature(&self) -> String {
        canonical_signature(&self.name, &self.inputs)
    }
}

fn canonical_signature(name: &str, inputs: &[InputSpec]) -> String {
    let types: Vec<String> = inputs.iter().map(|i| i.canonical_type()).collect();
    format!("{}({})", name, types.join(","))
}

fn compute_selector(name: &str, inputs: &[InputSpec]) -> Selector {
    let hash = keccak256(canonical_signature(name, inputs).as_bytes());
    Selector::from_slice(&hash[..4])
}

/// Registry of state-changing functions keyed by selector.
///
/// Two functions sharing a selector cannot both be registered: the one seen
/// last replaces the earlier entry and a warning is logged.
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    functions: HashMap<Selector, FunctionSignature>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed JSON ABI.
    pub fn build(abi: &JsonAbi) -> Self {
        Self::from_functions(abi.functions())
    }

    /// Build from a JSON ABI document (the compiler artifact's `abi` array).
    pub fn from_json_str(json: &str) -> Result<Self, AbiError> {
        let abi: JsonAbi =
            serde_json::from_str(json).map_err(|e| AbiError::Source(e.to_string()))?;
        Ok(Self::build(&abi))
    }

    pub fn from_file(path: &Path) -> Result<Self, AbiError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AbiError::Source(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Build from human-readable signatures such as
    /// `"function transfer(address to, uint256 amount)"`.
    pub fn from_signatures<'a>(
        signatures: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, AbiError> {
        let functions = signatures
            .into_iter()
            .map(|sig| {
                Function::parse(sig)
                    .map_err(|e| AbiError::Source(format!("invalid signature '{}': {}", sig, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_functions(functions.iter()))
    }

    fn from_functions<'a>(functions: impl Iterator<Item = &'a Function>) -> Self {
        let mut registry = Self::new();
        let mut skipped = 0usize;

        for function in functions {
            if matches!(
                function.state_mutability,
                StateMutability::View | StateMutability::Pure
            ) {
                continue;
            }

            match FunctionSignature::from_function(function) {
                Ok(signature) => registry.insert(signature),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping function '{}': {}", function.name, e);
                }
            }
        }

        tracing::info!(
            "Built signature registry with {} function(s) ({} skipped)",
            registry.len(),
            skipped
        );

        registry
    }

    /// Register a signature, replacing any entry with the same selector.
    pub fn insert(&mut self, signature: FunctionSignature) {
        let selector = signature.selector;
        if let Some(previous) = self.functions.insert(selector, signature) {
            tracing::warn!(
                "Selector {} of '{}' replaced by '{}'",
                selector,
                previous.canonical_signature(),
                self.functions[&selector].canonical_signature()
            );
        }
    }

    pub fn lookup(&self, selector: &Selector) -> Option<&FunctionSignature> {
        self.functions.get(selector)
    }

    /// Find by function name or by canonical signature.
    pub fn find(&self, name_or_signature: &str) -> Option<&FunctionSignature> {
        if name_or_signature.contains('(') {
            return self
                .functions
                .values()
                .find(|f| f.canonical_signature() == name_or_signature);
        }
        self.functions.values().find(|f| f.name == name_or_signature)
    }

    /// All signatures, ordered by name for stable listings.
    pub fn signatures(&self) -> Vec<&FunctionSignature> {
        let mut all: Vec<&FunctionSignature> = self.functions.values().collect();
        all.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.canonical_signature().cmp(&b.canonical_signature()))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
