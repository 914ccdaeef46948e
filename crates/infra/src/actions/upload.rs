//! Path create, chunked append and flush primitives
//!
//! The storage path API writes a file in three steps: create (or truncate)
//! the path, append byte ranges at explicit positions, then flush at the
//! final length to commit. Appends are sent in slices of
//! `upload_chunk_bytes` so large files never sit in memory whole.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, Response};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use super::context::ActionContext;
use super::error::ActionError;

const OCTET_STREAM: &str = "application/octet-stream";

/// PUT `?resource=file`, creating the path or truncating an existing file.
pub(crate) async fn create_file(
    ctx: &ActionContext,
    url: &Url,
    token: &str,
) -> Result<Response, ActionError> {
    ctx.send(
        ctx.request(Method::PUT, url, token)
            .query(&[("resource", "file")])
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(CONTENT_LENGTH, 0)
            .body(Vec::new()),
    )
    .await
}

/// Current length of the remote file, from a HEAD request.
pub(crate) async fn remote_length(
    ctx: &ActionContext,
    url: &Url,
    token: &str,
) -> Result<u64, ActionError> {
    let response = ctx.send(ctx.request(Method::HEAD, url, token)).await?;
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            ActionError::UnexpectedResponse("remote file did not report a Content-Length".into())
        })
}

/// An opened local upload source.
///
/// Opened before any remote request so a bad path never truncates the
/// target.
#[derive(Debug)]
pub(crate) struct LocalSource {
    path: PathBuf,
    file: File,
}

impl LocalSource {
    pub(crate) async fn open(path: impl AsRef<Path>) -> Result<Self, ActionError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|err| unreadable(&path, &err))?;
        let metadata = file.metadata().await.map_err(|err| unreadable(&path, &err))?;
        if !metadata.is_file() {
            return Err(ActionError::Setup(format!("cannot read {}: not a file", path.display())));
        }
        Ok(Self { path, file })
    }
}

/// Append `source` starting at remote offset `start`.
/// Returns the number of bytes sent.
pub(crate) async fn append_file(
    ctx: &ActionContext,
    url: &Url,
    token: &str,
    source: LocalSource,
    start: u64,
) -> Result<u64, ActionError> {
    let LocalSource { path, mut file } = source;
    let mut buffer = vec![0_u8; ctx.upload_chunk_bytes()];
    let mut position = start;

    loop {
        let filled = read_chunk(&mut file, &mut buffer).await.map_err(|err| unreadable(&path, &err))?;
        if filled == 0 {
            break;
        }

        debug!(position, bytes = filled, "appending chunk");
        ctx.send(
            ctx.request(Method::PATCH, url, token)
                .query(&[("action", "append"), ("position", &position.to_string())])
                .header(CONTENT_TYPE, OCTET_STREAM)
                .body(buffer[..filled].to_vec()),
        )
        .await?;
        position += filled as u64;
    }

    Ok(position - start)
}

/// PATCH `?action=flush` at `position`, committing appended data.
pub(crate) async fn flush(
    ctx: &ActionContext,
    url: &Url,
    token: &str,
    position: u64,
) -> Result<Response, ActionError> {
    ctx.send(
        ctx.request(Method::PATCH, url, token)
            .query(&[("action", "flush"), ("position", &position.to_string())])
            .header(CONTENT_LENGTH, 0)
            .body(Vec::new()),
    )
    .await
}

/// Fill `buffer` from `file`, short only at end of file.
async fn read_chunk(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

fn unreadable(path: &Path, err: &std::io::Error) -> ActionError {
    ActionError::Setup(format!("cannot read {}: {err}", path.display()))
}
