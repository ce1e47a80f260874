//! TCP protocol between the exercise server and its clients.
//!
//! Length-delimited frames, bincode bodies. Clients send control messages,
//! the server pushes session notifications and one feed event per frame.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::exercise::{ExerciseKind, Reading};

/// Output of one processed frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub exercise: ExerciseKind,
    /// Id of the frame the reading was derived from
    pub frame_id: u64,
    /// Wall clock, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub reading: Reading,
}

impl FeedEvent {
    pub fn new(exercise: ExerciseKind, frame_id: u64, reading: Reading) -> Self {
        Self {
            exercise,
            frame_id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            reading,
        }
    }

    /// Flat JSON in the shape the web client consumes.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "event": self.exercise.feed_event(),
            "frame_id": self.frame_id,
            "timestamp_ms": self.timestamp_ms,
            "count": self.reading.count,
            "accuracy": self.reading.accuracy,
        });
        if let Some(label) = &self.reading.label {
            value["state"] = label.clone().into();
        }
        if let Some(hold) = self.reading.hold_secs {
            value["hold_time"] = hold.into();
        }
        if let Some(max_hold) = self.reading.max_hold_secs {
            value["max_hold_time"] = max_hold.into();
        }
        value
    }
}

/// Client → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Start { exercise: ExerciseKind },
    /// `None` stops whatever is running
    Stop { exercise: Option<ExerciseKind> },
    Ping,
}

/// Server → client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ready,
    Started { exercise: ExerciseKind },
    Stopped { exercise: ExerciseKind },
    Feed(FeedEvent),
    Pong,
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(16 * 1024 * 1024) // 16MB
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
