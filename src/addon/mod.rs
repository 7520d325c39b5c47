//! Addon layer
//! - detail.rs: XpiDetail aggregate and its merge rules
//! - parser.rs: XpiParser running manifest parsers in priority order

pub mod detail;
pub mod parser;

pub use detail::XpiDetail;
pub use parser::{XpiParseError, XpiParser};
