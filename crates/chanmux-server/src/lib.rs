//! Channel multiplexing engine for chanmux.
//!
//! Runs many independent byte channels over one message transport:
//! - a frame router demultiplexes inbound frames by varint channel id
//! - a control plane owns the channel registry and every lifecycle transition
//! - an output writer serializes all channels' frames onto the transport
//! - each opened channel is served by its own handler task
//!
//! The transport is torn down only after every channel's handler has returned.

pub mod channel;
pub mod config;
mod control;
pub mod error;
pub mod handler;
mod plane;
pub mod router;
pub mod server;
mod writer;

pub use channel::{Channel, ChannelReader, ChannelState};
pub use config::MuxConfig;
pub use error::{ChannelError, MuxError, Result};
pub use handler::Handler;
pub use router::RouterExit;
pub use server::{MuxReport, Multiplexer};
