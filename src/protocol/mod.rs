//! Wire protocol
//!
//! Newline-delimited UTF-8 text. The first client line is the username,
//! every following line is relayed to the other clients.

pub mod parser;
pub mod responses;

pub use parser::normalize_line;
pub use responses::{chat_line, joined_notice, left_notice};
