//! Live distribution of a capture log.
//!
//! Each WebSocket viewer connected to `/messages` gets its own
//! [`DistributionSession`]: a tail of the log from byte 0, forwarded one
//! record per text message until the viewer leaves or the server stops.

mod error;
mod http;
mod server;
mod session;
mod tail;

pub use error::*;
pub use server::*;
pub use session::*;
pub use tail::*;
