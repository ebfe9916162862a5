//! Contract ABI handling for proposal payloads.
//!
//! - `registry`: selector → function signature, built from the contract ABI
//! - `value_tree`: editable argument values shaped like a signature's inputs
//! - `codec`: value tree ⇄ call payload
//! - `display`: presentation rules for decoded arguments
//!
//! ```text
//! JsonAbi ──► SignatureRegistry ──► CallCodec::decode(payload) ──► DecodedCall
//!                    │                       ▲
//!                    ▼                       │
//!             FunctionSignature ──► ValueTree ──► CallCodec::encode ──► payload
//! ```

pub mod codec;
pub mod display;
pub mod error;
pub mod input;
pub mod registry;
pub mod value_tree;

pub use codec::{encode_call, CallCodec, DecodedCall, UNKNOWN_FUNCTION};
pub use display::{render, render_call, RenderedArgument};
pub use error::AbiError;
pub use input::{InputSpec, ScalarType};
pub use registry::{FunctionSignature, SignatureRegistry};
pub use value_tree::{ArgumentValue, ValueTree};
