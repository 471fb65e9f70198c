//! Process-wide `tracing` setup. The composition root owns the [`Logger`];
//! components only emit events and spans.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
