//! Consumer for the streaming `improve` transport: a line-delimited event
//! stream where each `data: ` line carries a JSON payload of type
//! `status | chunk | complete | error`. Chunks accumulate into the improved
//! content; `complete` finalizes; `error` raises. Each call consumes its own
//! stream with exactly one subscriber.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::trace;

use super::BackendError;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImproveEvent {
    Status {
        #[serde(default)]
        message: String,
    },
    Chunk {
        content: String,
    },
    Complete {
        #[serde(default)]
        improved_content: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

pub async fn consume_improve_stream(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<String>,
) -> Result<String, BackendError> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut content = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk_str = std::str::from_utf8(&chunk)
            .map_err(|e| BackendError::Stream(format!("invalid utf-8 in stream: {e}")))?;

        // Events can fragment across transport frames; buffer until a full
        // line is available.
        buffer.push_str(chunk_str);

        while let Some(newline) = buffer.find('\n') {
            let line = buffer[..newline].to_string();
            buffer.drain(..=newline);
            if let Some(result) = handle_line(&line, &mut content, &tx)? {
                return Ok(result);
            }
        }
    }

    // A final event may arrive without a trailing newline.
    let tail = std::mem::take(&mut buffer);
    if let Some(result) = handle_line(&tail, &mut content, &tx)? {
        return Ok(result);
    }

    Err(BackendError::StreamTruncated)
}

/// Processes one stream line. Returns `Ok(Some(content))` when the stream
/// completed, `Ok(None)` to keep reading.
fn handle_line(
    line: &str,
    content: &mut String,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<Option<String>, BackendError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(data) = line.strip_prefix("data: ") else {
        return Ok(None);
    };

    match serde_json::from_str::<ImproveEvent>(data)? {
        ImproveEvent::Status { message } => {
            trace!(%message, "improve stream status");
            Ok(None)
        }
        ImproveEvent::Chunk { content: delta } => {
            content.push_str(&delta);
            // The receiver may have gone away; the stream still finishes.
            let _ = tx.send(delta);
            Ok(None)
        }
        ImproveEvent::Complete { improved_content } => {
            Ok(Some(improved_content.unwrap_or_else(|| content.clone())))
        }
        ImproveEvent::Error { message } => Err(BackendError::Stream(message)),
    }
}
