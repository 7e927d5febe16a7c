use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::models::{Identity, PermissionCatalog};
use crate::services::{PermissionGate, ServiceError};

/// Most recent log bytes returned by `GET /logs`.
pub const MAX_LOG_BYTES: u64 = 256 * 1024;

/// Serves the tail of the gateway's own log file to the reserved administrator.
#[derive(Debug, Clone)]
pub struct LogReader {
    path: Option<PathBuf>,
    max_bytes: u64,
}

impl LogReader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_limit(path, MAX_LOG_BYTES)
    }

    pub fn with_limit(path: Option<PathBuf>, max_bytes: u64) -> Self {
        Self { path, max_bytes }
    }

    pub async fn read(
        &self,
        caller: &Identity,
        catalog: &PermissionCatalog,
    ) -> Result<String, ServiceError> {
        PermissionGate::require_administrator(caller, catalog)?;

        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ServiceError::Operation("Log file is not configured".to_string()))?;

        read_tail(path, self.max_bytes).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read log file");
            ServiceError::Operation(format!("Log file unavailable: {}", e))
        })
    }
}

/// Last `max_bytes` of the file, starting at a line boundary when the file was cut.
async fn read_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(max_bytes);
    if start == 0 {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf).await?;
        return Ok(String::from_utf8_lossy(&buf).into_owned());
    }

    // One byte early so a cut that lands on a line start keeps that line.
    file.seek(SeekFrom::Start(start - 1)).await?;
    let mut buf = Vec::with_capacity(max_bytes as usize + 1);
    file.take(max_bytes + 1).read_to_end(&mut buf).await?;

    let tail = match buf.iter().position(|&b| b == b'\n') {
        Some(newline) => &buf[newline + 1..],
        None => &buf[..],
    };

    Ok(String::from_utf8_lossy(tail).into_owned())
}
