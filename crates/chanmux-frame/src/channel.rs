//! Channel identifiers.
//!
//! Id 0 is the control channel. Every other id names a logical channel and
//! is chosen by the peer that opens it.

/// Identifier of a logical channel on one connection.
pub type ChannelId = u64;

/// Control plane (open/close commands).
pub const CONTROL_CHANNEL: ChannelId = 0;

/// Returns true if the id may never be assigned to a logical channel.
pub fn is_reserved(id: ChannelId) -> bool {
    id == CONTROL_CHANNEL
}

/// Returns a human-readable name for a channel id.
pub fn channel_name(id: ChannelId) -> &'static str {
    match id {
        CONTROL_CHANNEL => "CONTROL",
        _ => "USER",
    }
}
