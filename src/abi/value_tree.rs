//! Editable argument values mirroring a function's input tree.
//!
//! Values stay as UI-entered strings until encoding. All edits are
//! persistent: they return a new tree in which only the nodes on the edited
//! path are rebuilt, while every untouched subtree is shared by `Arc`.

use std::sync::Arc;

use serde_json::Value;

use super::error::AbiError;
use super::input::InputSpec;
use super::registry::FunctionSignature;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    /// UI-entered text, `None` when never touched.
    Scalar(Option<String>),
    /// One child per tuple component, positionally aligned.
    Tuple(Vec<Arc<ArgumentValue>>),
    /// Variable number of children, all shaped like the element type.
    Array(Vec<Arc<ArgumentValue>>),
}

/// Top-level argument list, one entry per function input.
pub type ValueTree = Vec<Arc<ArgumentValue>>;

impl ArgumentValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Some(value.into()))
    }

    pub fn tuple(children: Vec<ArgumentValue>) -> Self {
        Self::Tuple(children.into_iter().map(Arc::new).collect())
    }

    pub fn array(children: Vec<ArgumentValue>) -> Self {
        Self::Array(children.into_iter().map(Arc::new).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&[Arc<ArgumentValue>]> {
        match self {
            Self::Tuple(children) | Self::Array(children) => Some(children),
            Self::Scalar(_) => None,
        }
    }
}

/// Empty value for one input: arrays start empty, tuples get one empty
/// child per component, scalars start as the empty string.
pub fn empty_value(spec: &InputSpec) -> ArgumentValue {
    match spec {
        InputSpec::Scalar { .. } => ArgumentValue::text(""),
        InputSpec::Tuple { components, .. } => {
            ArgumentValue::Tuple(components.iter().map(|c| Arc::new(empty_value(c))).collect())
        }
        InputSpec::Array { .. } => ArgumentValue::Array(Vec::new()),
    }
}

pub fn create_empty(signature: &FunctionSignature) -> ValueTree {
    signature
        .inputs
        .iter()
        .map(|input| Arc::new(empty_value(input)))
        .collect()
}

/// Node addressed by `path`, if any.
pub fn get<'a>(tree: &'a [Arc<ArgumentValue>], path: &[usize]) -> Option<&'a ArgumentValue> {
    let (&first, rest) = path.split_first()?;
    let mut node = tree.get(first)?.as_ref();
    for &index in rest {
        node = node.children()?.get(index)?.as_ref();
    }
    Some(node)
}

/// Input spec describing the node at `path`. Every array index maps to the
/// array's single element type.
pub fn spec_at<'a>(inputs: &'a [InputSpec], path: &[usize]) -> Option<&'a InputSpec> {
    let (&first, rest) = path.split_first()?;
    let mut spec = inputs.get(first)?;
    for &index in rest {
        spec = match spec {
            InputSpec::Tuple { components, .. } => components.get(index)?,
            InputSpec::Array { element, .. } => element,
            InputSpec::Scalar { .. } => return None,
        };
    }
    Some(spec)
}

/// Replace the node at `path`.
pub fn set(
    tree: &[Arc<ArgumentValue>],
    path: &[usize],
    new_value: ArgumentValue,
) -> Result<ValueTree, AbiError> {
    update_at(tree, path, |_| Ok(new_value)).map_err(|reason| AbiError::value_tree(reason, path))
}

/// Append one empty element to the array at `path`.
pub fn append_array_element(
    tree: &[Arc<ArgumentValue>],
    inputs: &[InputSpec],
    path: &[usize],
) -> Result<ValueTree, AbiError> {
    let element = match spec_at(inputs, path) {
        Some(InputSpec::Array { element, .. }) => element,
        Some(_) => return Err(AbiError::value_tree("not an array input", path)),
        None => return Err(AbiError::value_tree("no input at path", path)),
    };

    update_at(tree, path, |node| match node {
        ArgumentValue::Array(items) => {
            let mut items = items.clone();
            items.push(Arc::new(empty_value(element)));
            Ok(ArgumentValue::Array(items))
        }
        _ => Err("value is not an array".to_string()),
    })
    .map_err(|reason| AbiError::value_tree(reason, path))
}

/// Remove element `index` from the array at `path`. The last remaining
/// element can never be removed.
pub fn remove_array_element(
    tree: &[Arc<ArgumentValue>],
    path: &[usize],
    index: usize,
) -> Result<ValueTree, AbiError> {
    update_at(tree, path, |node| match node {
        ArgumentValue::Array(items) if index >= items.len() => Err(format!(
            "element {} out of bounds for array of length {}",
            index,
            items.len()
        )),
        ArgumentValue::Array(items) if items.len() <= 1 => {
            Err("an array must keep at least one element".to_string())
        }
        ArgumentValue::Array(items) => {
            let mut items = items.clone();
            items.remove(index);
            Ok(ArgumentValue::Array(items))
        }
        _ => Err("value is not an array".to_string()),
    })
    .map_err(|reason| AbiError::value_tree(reason, path))
}

fn update_at<F>(
    children: &[Arc<ArgumentValue>],
    path: &[usize],
    f: F,
) -> Result<Vec<Arc<ArgumentValue>>, String>
where
    F: FnOnce(&ArgumentValue) -> Result<ArgumentValue, String>,
{
    let (&index, rest) = path.split_first().ok_or_else(|| "empty path".to_string())?;
    let child = children
        .get(index)
        .ok_or_else(|| format!("index {} out of bounds", index))?;

    let replacement = if rest.is_empty() {
        f(child)?
    } else {
        match child.as_ref() {
            ArgumentValue::Tuple(items) => ArgumentValue::Tuple(update_at(items, rest, f)?),
            ArgumentValue::Array(items) => ArgumentValue::Array(update_at(items, rest, f)?),
            ArgumentValue::Scalar(_) => return Err("path descends into a scalar".to_string()),
        }
    };

    let mut updated = children.to_vec();
    updated[index] = Arc::new(replacement);
    Ok(updated)
}

/// Build a value tree from JSON: strings (or numbers/bools) for scalars,
/// nested arrays for tuples and arrays.
pub fn from_json(inputs: &[InputSpec], json: &Value) -> Result<ValueTree, AbiError> {
    let items = json
        .as_array()
        .ok_or_else(|| AbiError::value_tree("arguments must be a JSON array", &[]))?;
    if items.len() != inputs.len() {
        return Err(AbiError::value_tree(
            format!("expected {} argument(s), got {}", inputs.len(), items.len()),
            &[],
        ));
    }

    let mut path = Vec::new();
    inputs
        .iter()
        .zip(items)
        .enumerate()
        .map(|(i, (spec, item))| {
            path.clear();
            path.push(i);
            json_value(spec, item, &mut path).map(Arc::new)
        })
        .collect()
}

fn json_value(
    spec: &InputSpec,
    json: &Value,
    path: &mut Vec<usize>,
) -> Result<ArgumentValue, AbiError> {
    match spec {
        InputSpec::Scalar { .. } => match json {
            Value::String(s) => Ok(ArgumentValue::text(s.clone())),
            Value::Number(n) => Ok(ArgumentValue::text(n.to_string())),
            Value::Bool(b) => Ok(ArgumentValue::text(b.to_string())),
            Value::Null => Ok(ArgumentValue::Scalar(None)),
            _ => Err(AbiError::value_tree("expected a scalar", path)),
        },
        InputSpec::Tuple { components, .. } => {
            let items = json
                .as_array()
                .ok_or_else(|| AbiError::value_tree("expected a JSON array for tuple", path))?;
            if items.len() != components.len() {
                return Err(AbiError::value_tree(
                    format!("tuple expects {} component(s), got {}", components.len(), items.len()),
                    path,
                ));
            }
            let mut children = Vec::with_capacity(items.len());
            for (i, (component, item)) in components.iter().zip(items).enumerate() {
                path.push(i);
                children.push(Arc::new(json_value(component, item, path)?));
                path.pop();
            }
            Ok(ArgumentValue::Tuple(children))
        }
        InputSpec::Array { element, .. } => {
            let items = json
                .as_array()
                .ok_or_else(|| AbiError::value_tree("expected a JSON array", path))?;
            let mut children = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i);
                children.push(Arc::new(json_value(element, item, path)?));
                path.pop();
            }
            Ok(ArgumentValue::Array(children))
        }
    }
}
