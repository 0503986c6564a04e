//! URL handling module for Frontier-Crawl
//!
//! Every enqueue, dispatch and fetch goes through [`canonicalize`], which
//! produces the uniqueness key shared by the frontier and document tables.
//! The wildcard matcher restricts link-following to a source's own hosts.

mod matcher;
mod normalize;

pub use matcher::{matches_wildcard, url_matches};
pub use normalize::canonicalize;
