//! Built-in predicates bridging terms to an item store
//!
//! - [`codec`]: attribute values to and from tagged terms
//! - [`keys`]: key specifications (`id-5`, `'UserID'-1 -&- 'Timestamp'-2`)
//! - [`stream`]: cursors streamed into backtracking search
//! - [`store`]: `scan/2`, `get_item/3`, `put_item/2`, ...
//! - [`builtins`], [`json`]: `between/3`, `is_list/1`, `json_prolog/2`, `json_atom/2`, ...
//! - [`registry`], [`query`]: dispatch and depth-first query evaluation

pub mod builtins;
pub mod codec;
pub mod error;
pub mod json;
pub mod keys;
pub mod query;
pub mod registry;
pub mod store;
pub mod stream;

pub use codec::{decode, decode_item, encode, encode_item, simplify};
pub use error::{BuiltinError, BuiltinResult};
pub use keys::{item_key, resolve_key, split_key_spec, split_pair};
pub use query::{evaluate_query, extract_bindings, query_variables, QuerySolutions};
pub use registry::{Builtins, Predicate};
pub use store::{attribute_value, StorePredicates};
pub use stream::{ItemStream, Solutions, StreamState};
