//! Persisted record model for wiretap capture logs.
//!
//! A capture log is a JSON Lines file: every line is one [`CapturedRecord`],
//! written once by the capture ledger and never touched again. This crate is
//! the contract shared by the writer side (`wiretap`) and the reader side
//! (`wiretap-web`), and by anything else that wants to consume the log.

mod primitives;
mod record;

pub use primitives::*;
pub use record::*;
