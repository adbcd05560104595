//! Core term machinery: substitutions, unification, the standard order of
//! terms and list traversal.

pub mod lists;
pub mod ordering;
pub mod unification;

pub use lists::{is_proper_list, list_elements, ListError};
pub use ordering::compare_terms;
pub use unification::{unify, unify_into, Substitution};
