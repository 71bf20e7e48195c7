use std::fmt;
use std::io;

use chanmux_frame::FrameError;
use chanmux_server::MuxError;
use chanmux_transport::TransportError;

// Exit codes follow the sysexits-flavoured table shared by our CLIs.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn mux_error(context: &str, err: MuxError) -> CliError {
    match err {
        MuxError::TransportRead(err) | MuxError::TransportWrite(err) => {
            transport_error(context, err)
        }
        MuxError::MalformedChannelId(err) | MuxError::Frame(err) => frame_error(context, err),
        MuxError::UnsupportedMessageKind(_) | MuxError::UnknownChannelId(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_io_errors_use_io_codes() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                path: "/tmp/missing.sock".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect failed: "));

        let err = transport_error("read failed", TransportError::InvalidMagic);
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn protocol_violations_are_data_invalid() {
        assert_eq!(
            mux_error("run", MuxError::UnknownChannelId(9)).code,
            DATA_INVALID
        );
        assert_eq!(
            mux_error("run", MuxError::MalformedChannelId(FrameError::IncompleteNumber)).code,
            DATA_INVALID
        );
        assert_eq!(
            mux_error("run", MuxError::TransportWrite(TransportError::Closed)).code,
            FAILURE
        );
        assert_eq!(mux_error("run", MuxError::ControlPlaneGone).code, INTERNAL);
    }
}
