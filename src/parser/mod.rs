//! Lexical Parser and Statement Parser.

pub mod file;
pub mod statement;
pub mod util;

pub use file::parse_file;
pub use statement::parse_statements;
