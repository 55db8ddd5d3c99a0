//! Call/response exchanges over the project event socket.

use serde_json::{Value, json};

use super::connection::EventSocket;
use super::frame::Frame;
use crate::error::{OverleafError, Result};
use crate::fs::Folder;

const JOIN_PROJECT_RESPONSE: &str = "joinProjectResponse";

/// Narrow protocol client: one tree fetch or one document pull per socket.
///
/// Every wait is a strict loop over incoming frames. Heartbeats are echoed,
/// frames that are not the awaited one are skipped, and an error frame
/// aborts with [`OverleafError::RemoteUnauthorized`].
pub struct ProtocolClient<S> {
    socket: S,
    last_ack: u64,
}

impl<S: EventSocket> ProtocolClient<S> {
    pub fn new(socket: S) -> Self {
        Self {
            socket,
            last_ack: 0,
        }
    }

    /// Give the socket back, e.g. to close it.
    pub fn into_inner(self) -> S {
        self.socket
    }

    /// Wait for the join response and decode the project's root folder.
    pub async fn join_project(&mut self) -> Result<Folder> {
        let (name, args) = self.next_event().await?;
        if name != JOIN_PROJECT_RESPONSE {
            return Err(OverleafError::Protocol(format!(
                "Expected {}, got event {:?}",
                JOIN_PROJECT_RESPONSE, name
            )));
        }
        root_folder_from_join(&args)
    }

    /// Pull the current lines of a doc, joined by `\n`.
    pub async fn pull_doc(&mut self, doc_id: &str) -> Result<String> {
        // The server speaks first; nothing may be sent before that.
        self.next_event().await?;

        // Answer is never awaited; the editor sends it the same way.
        self.emit("clientTracking.getConnectedUsers", Vec::new())
            .await?;

        let join = self
            .emit("joinDoc", vec![json!(doc_id), json!({ "encodeRanges": true })])
            .await?;
        let payload = self.await_ack(join).await?;
        let content = doc_content_from_ack(doc_id, payload)?;

        let leave = self.emit("leaveDoc", vec![json!(doc_id)]).await?;
        self.await_ack(leave).await?;

        Ok(content)
    }

    async fn emit(&mut self, name: &str, args: Vec<Value>) -> Result<u64> {
        self.last_ack += 1;
        let frame = Frame::event(self.last_ack, name, args);
        self.socket.send_text(&frame.encode()).await?;
        Ok(self.last_ack)
    }

    async fn next_event(&mut self) -> Result<(String, Vec<Value>)> {
        loop {
            match self.next_frame().await? {
                Frame::Event { name, args, .. } => return Ok((name, args)),
                other => tracing::debug!(frame = ?other, "skipping frame while awaiting event"),
            }
        }
    }

    async fn await_ack(&mut self, id: u64) -> Result<Option<Value>> {
        loop {
            match self.next_frame().await? {
                Frame::Ack { ack, payload } if ack == id => return Ok(payload),
                other => tracing::debug!(frame = ?other, awaiting = id, "skipping frame"),
            }
        }
    }

    /// Next frame that is neither a heartbeat nor an error.
    async fn next_frame(&mut self) -> Result<Frame> {
        loop {
            let text = self.socket.recv_text().await?;
            match Frame::parse(&text)? {
                Frame::Heartbeat => {
                    self.socket.send_text(&Frame::Heartbeat.encode()).await?;
                }
                Frame::Error { reason } => {
                    return Err(OverleafError::RemoteUnauthorized(if reason.is_empty() {
                        "Event socket rejected the session".to_string()
                    } else {
                        format!("Event socket rejected the session: {}", reason)
                    }));
                }
                Frame::Disconnect => {
                    return Err(OverleafError::Protocol(
                        "Server disconnected the event socket".to_string(),
                    ));
                }
                frame => return Ok(frame),
            }
        }
    }
}

fn root_folder_from_join(args: &[Value]) -> Result<Folder> {
    let roots = args
        .first()
        .and_then(|arg| arg.get("project"))
        .and_then(|project| project.get("rootFolder"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            OverleafError::Protocol("Join response carries no root folder".to_string())
        })?;

    match roots.as_slice() {
        [root] => Folder::from_value(root),
        other => Err(OverleafError::Protocol(format!(
            "Expected exactly one root folder, got {}",
            other.len()
        ))),
    }
}

/// joinDoc acks `[error, lines, version, ops, ranges]`.
fn doc_content_from_ack(doc_id: &str, payload: Option<Value>) -> Result<String> {
    let payload = payload.ok_or_else(|| {
        OverleafError::Protocol(format!("Empty joinDoc answer for {}", doc_id))
    })?;

    if let Some(error) = payload.get(0).filter(|e| !e.is_null()) {
        return Err(OverleafError::RemoteOperationFailed(format!(
            "joinDoc {} failed: {}",
            doc_id, error
        )));
    }

    let lines = payload
        .get(1)
        .and_then(Value::as_array)
        .ok_or_else(|| OverleafError::Protocol(format!("joinDoc answer for {} has no lines", doc_id)))?;

    let lines: Vec<String> = lines
        .iter()
        .map(|line| line.as_str().map(decode_line).unwrap_or_default())
        .collect();
    Ok(lines.join("\n"))
}

/// Undo the socket's byte-per-char line encoding.
///
/// Each char of a line carries one byte of UTF-8. Lines holding chars above
/// U+00FF, or bytes that are not UTF-8, are returned unchanged.
pub fn decode_line(line: &str) -> String {
    let bytes: Option<Vec<u8>> = line
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect();
    bytes
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| line.to_string())
}

/// Fetch a project's root folder over a fresh socket, closing it afterwards.
pub async fn fetch_project_tree<S: EventSocket>(socket: S) -> Result<Folder> {
    let mut client = ProtocolClient::new(socket);
    let result = client.join_project().await;
    finish(client.into_inner(), result).await
}

/// Pull one doc over a fresh socket, closing it afterwards.
pub async fn pull_doc_content<S: EventSocket>(socket: S, doc_id: &str) -> Result<String> {
    let mut client = ProtocolClient::new(socket);
    let result = client.pull_doc(doc_id).await;
    finish(client.into_inner(), result).await
}

async fn finish<S: EventSocket, T>(mut socket: S, result: Result<T>) -> Result<T> {
    if let Err(e) = socket.close().await {
        tracing::debug!(error = %e, "event socket close failed");
    }
    result
}
