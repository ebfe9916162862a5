//! Presentation of decoded arguments.
//!
//! Rendering never touches the value tree itself; truncated byte strings
//! are only shortened in the returned text.

use std::str::FromStr;

use alloy::primitives::{I256, U256};

use super::codec::DecodedCall;
use super::input::{InputSpec, ScalarType};
use super::value_tree::ArgumentValue;

/// Byte strings rendered at or above this many characters are truncated.
pub const TRUNCATE_AT: usize = 50;
/// Characters kept from a truncated byte string.
pub const TRUNCATED_LEN: usize = 48;

/// One rendered argument line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArgument {
    pub name: String,
    pub type_label: String,
    pub value: String,
}

pub fn render_call(call: &DecodedCall) -> Vec<RenderedArgument> {
    call.inputs
        .iter()
        .zip(call.values.iter())
        .map(|(spec, value)| RenderedArgument {
            name: spec.name().to_string(),
            type_label: spec.type_label(),
            value: render(spec, value),
        })
        .collect()
}

pub fn render(spec: &InputSpec, value: &ArgumentValue) -> String {
    match (spec, value) {
        (InputSpec::Scalar { ty, .. }, ArgumentValue::Scalar(raw)) => {
            render_scalar(*ty, raw.as_deref().unwrap_or(""))
        }
        (InputSpec::Array { element, .. }, ArgumentValue::Array(items)) => {
            let rendered: Vec<String> = items.iter().map(|v| render(element, v)).collect();
            format!("[{}]", rendered.join(", "))
        }
        (InputSpec::Tuple { components, .. }, ArgumentValue::Tuple(items)) => {
            let rendered: Vec<String> = components
                .iter()
                .zip(items.iter())
                .map(|(c, v)| render(c, v))
                .collect();
            format!("({})", rendered.join(", "))
        }
        (_, other) => format!("{:?}", other),
    }
}

fn render_scalar(ty: ScalarType, raw: &str) -> String {
    match ty {
        ScalarType::Uint(_) => U256::from_str(raw.trim())
            .map(|v| v.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        ScalarType::Int(_) => {
            let trimmed = raw.trim();
            let parsed = if trimmed.starts_with("0x") || trimmed.starts_with("-0x") {
                I256::from_hex_str(trimmed)
            } else {
                I256::from_dec_str(trimmed)
            };
            parsed.map(|v| v.to_string()).unwrap_or_else(|_| raw.to_string())
        }
        ScalarType::Bytes if raw.chars().count() >= TRUNCATE_AT => {
            let head: String = raw.chars().take(TRUNCATED_LEN).collect();
            format!("{}…", head)
        }
        _ => raw.to_string(),
    }
}
