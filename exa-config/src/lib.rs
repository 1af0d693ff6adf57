//! The EXAConf document model.
//!
//! The file is kept as a tree of [`Section`](section::Section)s, so comments,
//! ordering and keys unknown to this crate survive a load/commit cycle. Entity
//! records are mapped to and from that tree by [`ExaConf`].

mod error;
pub use error::*;

mod document;
pub use document::*;

pub mod lexer;
pub mod mapping;
pub mod parser;
pub mod section;
