//! Typed input trees for contract function arguments.

use alloy::dyn_abi::DynSolType;
use alloy::json_abi::Param;

/// Primitive argument types accepted by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Address,
    Bool,
    String,
    Bytes,
    /// `bytesN`, 1..=32
    FixedBytes(usize),
    /// `uintN`, N a multiple of 8 up to 256
    Uint(usize),
    /// `intN`, N a multiple of 8 up to 256
    Int(usize),
}

impl ScalarType {
    /// Parse an elementary Solidity type name. Returns `None` for anything
    /// outside the supported grammar (fixed-point, function pointers, ...).
    pub fn parse(ty: &str) -> Option<Self> {
        match ty {
            "address" => return Some(Self::Address),
            "bool" => return Some(Self::Bool),
            "string" => return Some(Self::String),
            "bytes" => return Some(Self::Bytes),
            "uint" => return Some(Self::Uint(256)),
            "int" => return Some(Self::Int(256)),
            _ => {}
        }

        if let Some(size) = ty.strip_prefix("bytes") {
            let size: usize = size.parse().ok()?;
            return (1..=32).contains(&size).then_some(Self::FixedBytes(size));
        }
        if let Some(bits) = ty.strip_prefix("uint") {
            return parse_int_bits(bits).map(Self::Uint);
        }
        if let Some(bits) = ty.strip_prefix("int") {
            return parse_int_bits(bits).map(Self::Int);
        }
        None
    }

    /// Canonical type name as used in selector computation.
    pub fn canonical(&self) -> String {
        match self {
            Self::Address => "address".to_string(),
            Self::Bool => "bool".to_string(),
            Self::String => "string".to_string(),
            Self::Bytes => "bytes".to_string(),
            Self::FixedBytes(size) => format!("bytes{}", size),
            Self::Uint(bits) => format!("uint{}", bits),
            Self::Int(bits) => format!("int{}", bits),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Uint(_) | Self::Int(_))
    }

    pub fn to_sol_type(&self) -> DynSolType {
        match *self {
            Self::Address => DynSolType::Address,
            Self::Bool => DynSolType::Bool,
            Self::String => DynSolType::String,
            Self::Bytes => DynSolType::Bytes,
            Self::FixedBytes(size) => DynSolType::FixedBytes(size),
            Self::Uint(bits) => DynSolType::Uint(bits),
            Self::Int(bits) => DynSolType::Int(bits),
        }
    }
}

fn parse_int_bits(bits: &str) -> Option<usize> {
    let bits: usize = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// One function input, possibly nested.
///
/// A tuple always carries at least one component and an array exactly one
/// element type; scalars carry neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    Scalar { name: String, ty: ScalarType },
    Tuple { name: String, components: Vec<InputSpec> },
    Array { name: String, element: Box<InputSpec> },
}

impl InputSpec {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::Scalar {
            name: name.into(),
            ty,
        }
    }

    /// Build from a JSON ABI parameter.
    ///
    /// Fails on fixed-size arrays, multi-dimensional arrays, empty tuples and
    /// unsupported elementary types.
    pub fn from_param(param: &Param) -> Result<Self, String> {
        Self::from_parts(&param.name, &param.ty, &param.components)
    }

    fn from_parts(name: &str, ty: &str, components: &[Param]) -> Result<Self, String> {
        if let Some(element_ty) = ty.strip_suffix("[]") {
            if element_ty.ends_with(']') {
                return Err(format!("multi-dimensional array '{}'", ty));
            }
            let element = Self::from_parts(name, element_ty, components)?;
            return Ok(Self::Array {
                name: name.to_string(),
                element: Box::new(element),
            });
        }

        if ty.ends_with(']') {
            return Err(format!("fixed-size array '{}'", ty));
        }

        if ty == "tuple" {
            if components.is_empty() {
                return Err(format!("tuple '{}' has no components", name));
            }
            let components = components
                .iter()
                .map(Self::from_param)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Tuple {
                name: name.to_string(),
                components,
            });
        }

        ScalarType::parse(ty)
            .map(|ty| Self::scalar(name, ty))
            .ok_or_else(|| format!("unsupported type '{}'", ty))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. } | Self::Tuple { name, .. } | Self::Array { name, .. } => name,
        }
    }

    /// Canonical type string, e.g. `(address,uint256)[]`.
    pub fn canonical_type(&self) -> String {
        match self {
            Self::Scalar { ty, .. } => ty.canonical(),
            Self::Tuple { components, .. } => {
                let inner: Vec<String> = components.iter().map(|c| c.canonical_type()).collect();
                format!("({})", inner.join(","))
            }
            Self::Array { element, .. } => format!("{}[]", element.canonical_type()),
        }
    }

    /// Type label shown next to an input, e.g. `uint256`, `tuple`, `address[]`.
    pub fn type_label(&self) -> String {
        match self {
            Self::Scalar { ty, .. } => ty.canonical(),
            Self::Tuple { .. } => "tuple".to_string(),
            Self::Array { element, .. } => format!("{}[]", element.type_label()),
        }
    }

    pub fn to_sol_type(&self) -> DynSolType {
        match self {
            Self::Scalar { ty, .. } => ty.to_sol_type(),
            Self::Tuple { components, .. } => {
                DynSolType::Tuple(components.iter().map(|c| c.to_sol_type()).collect())
            }
            Self::Array { element, .. } => DynSolType::Array(Box::new(element.to_sol_type())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: &str, components: Vec<Param>) -> Param {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "type": ty,
            "components": components,
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_scalar_types() {
        assert_eq!(ScalarType::parse("uint256"), Some(ScalarType::Uint(256)));
        assert_eq!(ScalarType::parse("uint"), Some(ScalarType::Uint(256)));
        assert_eq!(ScalarType::parse("int24"), Some(ScalarType::Int(24)));
        assert_eq!(ScalarType::parse("bytes32"), Some(ScalarType::FixedBytes(32)));
        assert_eq!(ScalarType::parse("bytes"), Some(ScalarType::Bytes));
        assert_eq!(ScalarType::parse("uint7"), None);
        assert_eq!(ScalarType::parse("bytes33"), None);
        assert_eq!(ScalarType::parse("fixed128x18"), None);
    }

    #[test]
    fn test_tuple_array_from_param() {
        let p = param(
            "routes",
            "tuple[]",
            vec![param("target", "address", vec![]), param("amount", "uint128", vec![])],
        );
        let spec = InputSpec::from_param(&p).unwrap();

        assert_eq!(spec.canonical_type(), "(address,uint128)[]");
        assert_eq!(spec.type_label(), "tuple[]");
        match spec {
            InputSpec::Array { name, element } => {
                assert_eq!(name, "routes");
                assert!(matches!(*element, InputSpec::Tuple { ref components, .. } if components.len() == 2));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_grammar_types() {
        assert!(InputSpec::from_param(&param("m", "uint256[][]", vec![])).is_err());
        assert!(InputSpec::from_param(&param("f", "address[3]", vec![])).is_err());
        assert!(InputSpec::from_param(&param("x", "function", vec![])).is_err());
    }

    #[test]
    fn test_sol_type_matches_canonical() {
        let p = param(
            "cfg",
            "tuple",
            vec![param("ids", "uint256[]", vec![]), param("flag", "bool", vec![])],
        );
        let spec = InputSpec::from_param(&p).unwrap();
        assert_eq!(spec.to_sol_type().sol_type_name(), spec.canonical_type());
    }
}
