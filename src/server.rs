//! Feed/control endpoint.
//!
//! Every client gets `Ready`, then the full broadcast feed. Control
//! messages from any client drive the shared [`Dispatcher`].

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::protocol::{self, ClientMessage, ServerMessage};
use crate::session::Dispatcher;

/// Accept clients until the listener fails.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("client connected: {addr}");
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            match handle_client(socket, dispatcher).await {
                Ok(()) => info!("client disconnected: {addr}"),
                Err(e) => warn!("client {addr}: {e:#}"),
            }
        });
    }
}

async fn handle_client(socket: TcpStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    socket.set_nodelay(true)?;
    let mut stream = protocol::message_stream(socket);
    let mut feed = dispatcher.subscribe();

    protocol::send_message(&mut stream, &ServerMessage::Ready).await?;

    loop {
        tokio::select! {
            msg = feed.recv() => match msg {
                Ok(msg) => protocol::send_message(&mut stream, &msg).await?,
                Err(RecvError::Lagged(n)) => debug!("client lagging, dropped {n} events"),
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(bytes)) => {
                    let msg: ClientMessage = bincode::deserialize(&bytes)?;
                    if let Some(reply) = handle_control(&dispatcher, msg).await? {
                        protocol::send_message(&mut stream, &reply).await?;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }

    Ok(())
}

/// Apply a control message. Session changes are announced on the feed;
/// only direct replies are returned.
async fn handle_control(
    dispatcher: &Arc<Dispatcher>,
    msg: ClientMessage,
) -> Result<Option<ServerMessage>> {
    match msg {
        ClientMessage::Start { exercise } => {
            // Starting joins the previous session thread.
            let dispatcher = Arc::clone(dispatcher);
            tokio::task::spawn_blocking(move || dispatcher.start(exercise)).await??;
            Ok(None)
        }
        ClientMessage::Stop { exercise } => {
            let dispatcher = Arc::clone(dispatcher);
            let stopped = tokio::task::spawn_blocking(move || dispatcher.stop(exercise)).await?;
            if stopped.is_none() {
                debug!("stop {exercise:?}: nothing to stop");
            }
            Ok(None)
        }
        ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExerciseConfig;
    use crate::exercise::ExerciseKind;
    use crate::landmark::{Keypoint, LandmarkSnapshot, Pose, PoseLandmark};
    use crate::protocol::{recv_message, send_message, MessageStream};
    use crate::source::{JsonOracle, ReplayCamera};
    use std::time::Duration;

    fn arms(y: f32) -> Option<LandmarkSnapshot> {
        let mut pose = Pose::blank();
        pose.set(PoseLandmark::Nose, Keypoint::at(0.5, 0.3));
        pose.set(PoseLandmark::LeftWrist, Keypoint::at(0.5, y));
        pose.set(PoseLandmark::RightWrist, Keypoint::at(0.5, y));
        Some(LandmarkSnapshot::with_pose(pose))
    }

    async fn start_server() -> (MessageStream, Arc<Dispatcher>) {
        let camera = ReplayCamera::from_snapshots(&[arms(0.2), arms(0.7)], true).unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            Box::new(camera),
            Box::new(JsonOracle::new()),
            ExerciseConfig::default(),
            Duration::from_millis(2),
            256,
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&dispatcher)));

        let client = protocol::message_stream(TcpStream::connect(addr).await.unwrap());
        (client, dispatcher)
    }

    async fn next_feed(client: &mut MessageStream) -> crate::protocol::FeedEvent {
        loop {
            if let ServerMessage::Feed(event) = recv_message(client).await.unwrap() {
                return event;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_client_session_round_trip() {
        let (mut client, dispatcher) = start_server().await;
        let ready: ServerMessage = recv_message(&mut client).await.unwrap();
        assert_eq!(ready, ServerMessage::Ready);

        send_message(&mut client, &ClientMessage::Ping).await.unwrap();
        let pong: ServerMessage = recv_message(&mut client).await.unwrap();
        assert_eq!(pong, ServerMessage::Pong);

        send_message(&mut client, &ClientMessage::Start { exercise: ExerciseKind::ArmRaise })
            .await
            .unwrap();
        let started: ServerMessage = recv_message(&mut client).await.unwrap();
        assert_eq!(started, ServerMessage::Started { exercise: ExerciseKind::ArmRaise });

        // Raise/lower alternates every frame with hands together.
        let mut event = next_feed(&mut client).await;
        while event.reading.count < 2 {
            assert_eq!(event.exercise, ExerciseKind::ArmRaise);
            event = next_feed(&mut client).await;
        }

        send_message(&mut client, &ClientMessage::Stop { exercise: None }).await.unwrap();
        loop {
            match recv_message::<ServerMessage>(&mut client).await.unwrap() {
                ServerMessage::Stopped { exercise } => {
                    assert_eq!(exercise, ExerciseKind::ArmRaise);
                    break;
                }
                ServerMessage::Feed(_) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(dispatcher.active(), None);
    }
}
