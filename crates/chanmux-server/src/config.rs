use chanmux_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};

/// Per-connection multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Label attached to this connection's log events.
    pub label: String,
    /// Maximum frame payload in either direction. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            label: "conn".to_string(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl MuxConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
        }
    }
}
