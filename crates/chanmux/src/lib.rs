//! Logical channel multiplexing over a single message transport.
//!
//! chanmux carries many independent, ordered byte channels over one duplex
//! message transport. Each frame is a varint channel id followed by its
//! payload; channel 0 carries open commands. Every opened channel is served
//! by its own handler task, and a connection is torn down only after every
//! handler has returned.
//!
//! # Crate Structure
//!
//! - [`transport`] — Message transport contract (memory, stream, UDS)
//! - [`frame`] — Varint channel ids, frames and control commands
//! - [`server`] — The multiplexing engine ([`server::Multiplexer`])

/// Re-export transport types.
pub mod transport {
    pub use chanmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chanmux_frame::*;
}

/// Re-export engine types.
pub mod server {
    pub use chanmux_server::*;
}

pub use chanmux_server::{Channel, Handler, MuxConfig, MuxError, MuxReport, Multiplexer};
