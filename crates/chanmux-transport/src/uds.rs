use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::codec::CodecConfig;
use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// Unix domain socket listener producing message transports.
///
/// Every accepted or connected stream is framed with [`crate::MessageCodec`].
/// The socket path is removed on `Drop` if it still refers to the socket this
/// listener created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    codec_config: CodecConfig,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket, it is removed first (stale
    /// socket cleanup). Must be called from within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| bind_error(&path, e))?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| bind_error(&path, e))?;
            } else {
                return Err(bind_error(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| bind_error(&path, e))?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| bind_error(&path, e))?;
        let created = std::fs::symlink_metadata(&path).map_err(|e| bind_error(&path, e))?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            created_inode: Some((created.dev(), created.ino())),
            codec_config: CodecConfig::default(),
        })
    }

    /// Override the codec configuration applied to accepted streams.
    pub fn with_codec_config(mut self, config: CodecConfig) -> Self {
        self.codec_config = config;
        self
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<StreamTransport<UnixStream>> {
        let (stream, _addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(StreamTransport::with_config(stream, self.codec_config.clone()))
    }

    /// Connect to a listening Unix domain socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<StreamTransport<UnixStream>> {
        Self::connect_with_config(path, CodecConfig::default()).await
    }

    /// Connect with an explicit codec configuration.
    pub async fn connect_with_config(
        path: impl AsRef<Path>,
        config: CodecConfig,
    ) -> Result<StreamTransport<UnixStream>> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to unix domain socket");
        Ok(StreamTransport::with_config(stream, config))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn bind_error(path: &Path, source: std::io::Error) -> TransportError {
    TransportError::Bind {
        path: path.to_path_buf(),
        source,
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}

impl std::fmt::Debug for UnixDomainSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixDomainSocket")
            .field("path", &self.path)
            .finish()
    }
}
