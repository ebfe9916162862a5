//! Call payload encoding and decoding.
//!
//! A payload is `selector ‖ abi_encode_params(arguments)`. Encoding coerces
//! the string leaves of a value tree into typed `DynSolValue`s; decoding goes
//! the other way and never fails: anything that cannot be matched or parsed
//! becomes the `Unknown` call carrying the raw payload.

use std::str::FromStr;
use std::sync::Arc;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::hex;
use alloy::primitives::{Address, Bytes, FixedBytes, Selector, Sign, I256, U256};

use super::error::AbiError;
use super::input::{InputSpec, ScalarType};
use super::registry::{FunctionSignature, SignatureRegistry};
use super::value_tree::{ArgumentValue, ValueTree};

pub const UNKNOWN_FUNCTION: &str = "Unknown";

/// A payload decoded back into its function and argument values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    pub function_name: String,
    /// `None` for the unknown fallback.
    pub selector: Option<Selector>,
    pub inputs: Vec<InputSpec>,
    pub values: ValueTree,
}

impl DecodedCall {
    /// Fallback for payloads no registered function matches: a single
    /// `raw` bytes argument holding the whole payload.
    pub fn unknown(payload: &[u8]) -> Self {
        Self {
            function_name: UNKNOWN_FUNCTION.to_string(),
            selector: None,
            inputs: vec![InputSpec::scalar("raw", ScalarType::Bytes)],
            values: vec![Arc::new(ArgumentValue::text(hex::encode_prefixed(payload)))],
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.selector.is_none()
    }
}

/// Encoder/decoder bound to one contract's registry. Cheap to clone and
/// safe to share.
#[derive(Debug, Clone)]
pub struct CallCodec {
    registry: Arc<SignatureRegistry>,
}

impl CallCodec {
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    pub fn encode(
        &self,
        signature: &FunctionSignature,
        values: &[Arc<ArgumentValue>],
    ) -> Result<Bytes, AbiError> {
        encode_call(signature, values)
    }

    pub fn decode(&self, payload: &[u8]) -> DecodedCall {
        let Some(selector) = payload.get(..4).map(Selector::from_slice) else {
            return DecodedCall::unknown(payload);
        };
        let Some(signature) = self.registry.lookup(&selector) else {
            return DecodedCall::unknown(payload);
        };

        match decode_arguments(signature, &payload[4..]) {
            Ok(values) => DecodedCall {
                function_name: signature.name.clone(),
                selector: Some(selector),
                inputs: signature.inputs.clone(),
                values,
            },
            Err(e) => {
                tracing::debug!(
                    "Payload matched selector {} ({}) but failed to decode: {}",
                    selector,
                    signature.name,
                    e
                );
                DecodedCall::unknown(payload)
            }
        }
    }
}

/// Encode `values` as a call to `signature`.
pub fn encode_call(
    signature: &FunctionSignature,
    values: &[Arc<ArgumentValue>],
) -> Result<Bytes, AbiError> {
    if values.len() != signature.inputs.len() {
        return Err(AbiError::encode(
            format!(
                "{} expects {} argument(s), got {}",
                signature.name,
                signature.inputs.len(),
                values.len()
            ),
            &[],
        ));
    }

    let mut path = Vec::new();
    let mut params = Vec::with_capacity(values.len());
    for (i, (spec, value)) in signature.inputs.iter().zip(values).enumerate() {
        path.push(i);
        params.push(coerce(spec, value, &mut path)?);
        path.pop();
    }

    let mut calldata = signature.selector.to_vec();
    calldata.extend(DynSolValue::Tuple(params).abi_encode_params());
    Ok(Bytes::from(calldata))
}

fn coerce(
    spec: &InputSpec,
    value: &ArgumentValue,
    path: &mut Vec<usize>,
) -> Result<DynSolValue, AbiError> {
    match (spec, value) {
        (InputSpec::Scalar { ty, .. }, ArgumentValue::Scalar(raw)) => {
            coerce_scalar(*ty, raw.as_deref().unwrap_or(""))
                .map_err(|reason| AbiError::encode(reason, path))
        }
        (InputSpec::Tuple { components, .. }, ArgumentValue::Tuple(items)) => {
            if items.len() != components.len() {
                return Err(AbiError::encode(
                    format!(
                        "tuple expects {} component(s), got {}",
                        components.len(),
                        items.len()
                    ),
                    path,
                ));
            }
            let mut encoded = Vec::with_capacity(items.len());
            for (i, (component, item)) in components.iter().zip(items).enumerate() {
                path.push(i);
                encoded.push(coerce(component, item, path)?);
                path.pop();
            }
            Ok(DynSolValue::Tuple(encoded))
        }
        (InputSpec::Array { element, .. }, ArgumentValue::Array(items)) => {
            if items.is_empty() {
                return Err(AbiError::encode("empty array", path));
            }
            let mut encoded = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i);
                encoded.push(coerce(element, item, path)?);
                path.pop();
            }
            Ok(DynSolValue::Array(encoded))
        }
        (spec, _) => Err(AbiError::encode(
            format!("value does not match input type {}", spec.type_label()),
            path,
        )),
    }
}

fn coerce_scalar(ty: ScalarType, raw: &str) -> Result<DynSolValue, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() && ty.is_numeric() {
        return Err(format!("a number is required for {}", ty.canonical()));
    }
    match ty {
        ScalarType::Uint(bits) => {
            let value = U256::from_str(trimmed)
                .map_err(|_| format!("'{}' is not a valid uint{}", raw, bits))?;
            if bits < 256 && value >> bits != U256::ZERO {
                return Err(format!("'{}' does not fit in uint{}", raw, bits));
            }
            Ok(DynSolValue::Uint(value, bits))
        }
        ScalarType::Int(bits) => {
            let value = parse_int(trimmed)
                .ok_or_else(|| format!("'{}' is not a valid int{}", raw, bits))?;
            if bits < 256 {
                let bound = U256::from(1) << (bits - 1);
                let magnitude = value.unsigned_abs();
                let fits = if value.is_negative() {
                    magnitude <= bound
                } else {
                    magnitude < bound
                };
                if !fits {
                    return Err(format!("'{}' does not fit in int{}", raw, bits));
                }
            }
            Ok(DynSolValue::Int(value, bits))
        }
        ScalarType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(DynSolValue::Bool(true)),
            "false" | "0" => Ok(DynSolValue::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", raw)),
        },
        ScalarType::Address => Address::from_str(trimmed)
            .map(DynSolValue::Address)
            .map_err(|_| format!("'{}' is not a valid address", raw)),
        ScalarType::Bytes => hex::decode(trimmed)
            .map(DynSolValue::Bytes)
            .map_err(|_| format!("'{}' is not valid hex bytes", raw)),
        ScalarType::FixedBytes(size) => {
            let bytes = hex::decode(trimmed)
                .map_err(|_| format!("'{}' is not valid hex bytes", raw))?;
            if bytes.len() != size {
                return Err(format!(
                    "bytes{} expects {} byte(s), got {}",
                    size,
                    size,
                    bytes.len()
                ));
            }
            Ok(DynSolValue::FixedBytes(FixedBytes::<32>::right_padding_from(&bytes), size))
        }
        ScalarType::String => Ok(DynSolValue::String(raw.to_string())),
    }
}

fn parse_int(raw: &str) -> Option<I256> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude = U256::from_str(digits).ok()?;
    let sign = if negative { Sign::Negative } else { Sign::Positive };
    I256::checked_from_sign_and_abs(sign, magnitude)
}

fn decode_arguments(signature: &FunctionSignature, data: &[u8]) -> Result<ValueTree, String> {
    let params_type = DynSolType::Tuple(signature.inputs.iter().map(|i| i.to_sol_type()).collect());
    let decoded = params_type
        .abi_decode_params(data)
        .map_err(|e| e.to_string())?;

    let DynSolValue::Tuple(values) = decoded else {
        return Err(format!("expected argument tuple, got {:?}", decoded));
    };
    if values.len() != signature.inputs.len() {
        return Err(format!(
            "expected {} argument(s), decoded {}",
            signature.inputs.len(),
            values.len()
        ));
    }

    signature
        .inputs
        .iter()
        .zip(values.iter())
        .map(|(spec, value)| to_argument(spec, value).map(Arc::new))
        .collect()
}

fn to_argument(spec: &InputSpec, value: &DynSolValue) -> Result<ArgumentValue, String> {
    match (spec, value) {
        (InputSpec::Tuple { components, .. }, DynSolValue::Tuple(items)) => {
            if items.len() != components.len() {
                return Err(format!(
                    "tuple length mismatch: expected {}, got {}",
                    components.len(),
                    items.len()
                ));
            }
            let children = components
                .iter()
                .zip(items)
                .map(|(c, v)| to_argument(c, v).map(Arc::new))
                .collect::<Result<_, _>>()?;
            Ok(ArgumentValue::Tuple(children))
        }
        (InputSpec::Array { element, .. }, DynSolValue::Array(items)) => {
            let children = items
                .iter()
                .map(|v| to_argument(element, v).map(Arc::new))
                .collect::<Result<_, _>>()?;
            Ok(ArgumentValue::Array(children))
        }
        (InputSpec::Scalar { .. }, value) => scalar_text(value).map(ArgumentValue::text),
        (spec, value) => Err(format!(
            "expected {} value, got {:?}",
            spec.type_label(),
            value
        )),
    }
}

fn scalar_text(value: &DynSolValue) -> Result<String, String> {
    match value {
        DynSolValue::Address(addr) => Ok(addr.to_checksum(None)),
        DynSolValue::Uint(val, _) => Ok(val.to_string()),
        DynSolValue::Int(val, _) => Ok(val.to_string()),
        DynSolValue::Bool(b) => Ok(b.to_string()),
        DynSolValue::FixedBytes(word, size) => Ok(hex::encode_prefixed(&word[..*size])),
        DynSolValue::Bytes(bytes) => Ok(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Ok(s.clone()),
        other => Err(format!("unsupported scalar value: {:?}", other)),
    }
}
