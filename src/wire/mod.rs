//! The wire layer: framer, response parser, and the ENVELOPE/BODY
//! sub-grammars. Everything here is stateless — no function in this
//! module touches a [`crate::session::state::Session`].

pub mod action;
pub mod body;
pub mod envelope;
pub mod framer;
pub mod lex;
pub mod parser;

pub use action::{Action, FetchAttr, Status};
pub use parser::parse_packet;
