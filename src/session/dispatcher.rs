use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::pacer::Pacer;
use crate::config::ExerciseConfig;
use crate::exercise::{Exercise, ExerciseKind, ExerciseState};
use crate::protocol::{FeedEvent, ServerMessage};
use crate::source::{FrameSource, LandmarkOracle};

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;
type SharedOracle = Arc<Mutex<Box<dyn LandmarkOracle>>>;

struct ActiveSession {
    kind: ExerciseKind,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ActiveSession {
    /// Clear the run flag and wait for the loop to finish its tick.
    fn stop(self) -> ExerciseKind {
        self.running.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("{} session thread panicked", self.kind);
        }
        self.kind
    }
}

/// Owns the one active exercise session.
///
/// Every session runs on its own thread: read frame (under the camera
/// lock), detect, ingest, publish, wait for the next tick. Starting an
/// exercise joins the previous session's thread first, so two trackers
/// never run at once.
pub struct Dispatcher {
    camera: SharedSource,
    oracle: SharedOracle,
    config: ExerciseConfig,
    frame_interval: Duration,
    feed: broadcast::Sender<ServerMessage>,
    active: Mutex<Option<ActiveSession>>,
}

impl Dispatcher {
    pub fn new(
        camera: Box<dyn FrameSource>,
        oracle: Box<dyn LandmarkOracle>,
        config: ExerciseConfig,
        frame_interval: Duration,
        feed_capacity: usize,
    ) -> Self {
        let (feed, _) = broadcast::channel(feed_capacity.max(1));
        Self {
            camera: Arc::new(Mutex::new(camera)),
            oracle: Arc::new(Mutex::new(oracle)),
            config,
            frame_interval,
            feed,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.feed.subscribe()
    }

    pub fn active(&self) -> Option<ExerciseKind> {
        self.active.lock().as_ref().map(|s| s.kind)
    }

    /// Start `kind` with fresh state, replacing any running session.
    pub fn start(&self, kind: ExerciseKind) -> Result<()> {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            let stopped = previous.stop();
            info!("{stopped} session stopped (superseded by {kind})");
            self.publish(ServerMessage::Stopped { exercise: stopped });
        }

        let running = Arc::new(AtomicBool::new(true));
        let worker = SessionWorker {
            state: ExerciseState::new(kind, &self.config),
            camera: Arc::clone(&self.camera),
            oracle: Arc::clone(&self.oracle),
            running: Arc::clone(&running),
            pacer: Pacer::new(self.frame_interval),
            feed: self.feed.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("session-{kind}"))
            .spawn(move || worker.run())
            .context("failed to spawn session thread")?;

        *active = Some(ActiveSession {
            kind,
            running,
            handle,
        });
        info!("{kind} session started");
        Ok(())
    }

    /// Stop the active session. With `Some(kind)` only a matching session
    /// is stopped. Returns the exercise that was stopped.
    pub fn stop(&self, kind: Option<ExerciseKind>) -> Option<ExerciseKind> {
        let mut active = self.active.lock();
        let current = active.as_ref()?.kind;
        if kind.is_some_and(|k| k != current) {
            debug!("stop {kind:?} ignored: {current} is active");
            return None;
        }

        let stopped = active.take()?.stop();
        info!("{stopped} session stopped");
        self.publish(ServerMessage::Stopped { exercise: stopped });
        Some(stopped)
    }

    fn publish(&self, msg: ServerMessage) {
        // No subscribers is fine.
        let _ = self.feed.send(msg);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(session) = self.active.get_mut().take() {
            session.stop();
        }
    }
}

struct SessionWorker {
    state: ExerciseState,
    camera: SharedSource,
    oracle: SharedOracle,
    running: Arc<AtomicBool>,
    pacer: Pacer,
    feed: broadcast::Sender<ServerMessage>,
}

impl SessionWorker {
    fn run(mut self) {
        let kind = self.state.kind();
        // Announced from the worker so it always precedes this session's feed.
        let _ = self.feed.send(ServerMessage::Started { exercise: kind });
        while self.running.load(Ordering::Acquire) {
            if let Some(event) = self.tick() {
                let _ = self.feed.send(ServerMessage::Feed(event));
            }
            self.pacer.wait();
        }
        debug!("{kind} session loop exited");
    }

    fn tick(&mut self) -> Option<FeedEvent> {
        let frame = match self.camera.lock().read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!("frame skipped: {e:#}");
                return None;
            }
        };

        let snapshot = match self.oracle.lock().detect(&frame) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("detection failed on frame {}: {e:#}", frame.id);
                None
            }
        };

        let reading = self.state.ingest(snapshot.as_ref());
        Some(FeedEvent::new(self.state.kind(), frame.id, reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Hand, HandLandmark, Keypoint, LandmarkSnapshot};
    use crate::source::{JsonOracle, ReplayCamera};
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn make_hand(closed: bool) -> Hand {
        let mut hand = Hand::blank();
        for tip in HandLandmark::FINGERTIPS {
            hand.set(tip.pip_of().unwrap(), Keypoint::at(0.5, 0.5));
            hand.set(tip, Keypoint::at(0.5, if closed { 0.6 } else { 0.4 }));
        }
        hand
    }

    fn open_close_recording() -> Vec<Option<LandmarkSnapshot>> {
        vec![
            Some(LandmarkSnapshot::with_hands(vec![make_hand(true)])),
            Some(LandmarkSnapshot::with_hands(vec![make_hand(false)])),
        ]
    }

    fn make_dispatcher(frames: &[Option<LandmarkSnapshot>], looping: bool) -> Dispatcher {
        let camera = ReplayCamera::from_snapshots(frames, looping).unwrap();
        Dispatcher::new(
            Box::new(camera),
            Box::new(JsonOracle::new()),
            ExerciseConfig::default(),
            Duration::from_millis(1),
            256,
        )
    }

    fn recv(rx: &mut broadcast::Receiver<ServerMessage>) -> ServerMessage {
        loop {
            match rx.blocking_recv() {
                Ok(msg) => return msg,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("feed closed"),
            }
        }
    }

    fn recv_feeds(rx: &mut broadcast::Receiver<ServerMessage>, n: usize) -> Vec<FeedEvent> {
        let mut feeds = Vec::new();
        while feeds.len() < n {
            if let ServerMessage::Feed(event) = recv(rx) {
                feeds.push(event);
            }
        }
        feeds
    }

    #[test]
    fn test_start_announces_then_feeds() {
        let dispatcher = make_dispatcher(&open_close_recording(), true);
        let mut rx = dispatcher.subscribe();
        dispatcher.start(ExerciseKind::OpenClose).unwrap();

        assert_eq!(recv(&mut rx), ServerMessage::Started { exercise: ExerciseKind::OpenClose });
        let feeds = recv_feeds(&mut rx, 5);
        assert!(feeds.iter().all(|f| f.exercise == ExerciseKind::OpenClose));
        assert!(feeds.windows(2).all(|w| w[0].frame_id < w[1].frame_id));
        assert_eq!(dispatcher.active(), Some(ExerciseKind::OpenClose));
    }

    #[test]
    fn test_counts_flow_through_feed() {
        let dispatcher = make_dispatcher(&open_close_recording(), true);
        let mut rx = dispatcher.subscribe();
        dispatcher.start(ExerciseKind::OpenClose).unwrap();

        let feeds = recv_feeds(&mut rx, 6);
        let last = feeds.last().unwrap();
        assert!(last.reading.count >= 2);
    }

    #[test]
    fn test_switch_stops_previous_first() {
        let dispatcher = make_dispatcher(&open_close_recording(), true);
        let mut rx = dispatcher.subscribe();
        dispatcher.start(ExerciseKind::OpenClose).unwrap();
        recv_feeds(&mut rx, 3);

        dispatcher.start(ExerciseKind::ArmRaise).unwrap();
        loop {
            match recv(&mut rx) {
                ServerMessage::Feed(f) => assert_eq!(f.exercise, ExerciseKind::OpenClose),
                ServerMessage::Stopped { exercise } => {
                    assert_eq!(exercise, ExerciseKind::OpenClose);
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(recv(&mut rx), ServerMessage::Started { exercise: ExerciseKind::ArmRaise });

        let feeds = recv_feeds(&mut rx, 5);
        assert!(feeds.iter().all(|f| f.exercise == ExerciseKind::ArmRaise));
        // Fresh state: arm raise never sees a pose in this recording
        assert!(feeds.iter().all(|f| f.reading.count == 0));
    }

    #[test]
    fn test_stop_filters_by_kind() {
        let dispatcher = make_dispatcher(&open_close_recording(), true);
        dispatcher.start(ExerciseKind::WristRotation).unwrap();

        assert_eq!(dispatcher.stop(Some(ExerciseKind::OpenClose)), None);
        assert_eq!(dispatcher.active(), Some(ExerciseKind::WristRotation));

        assert_eq!(
            dispatcher.stop(Some(ExerciseKind::WristRotation)),
            Some(ExerciseKind::WristRotation)
        );
        assert_eq!(dispatcher.active(), None);
        assert_eq!(dispatcher.stop(None), None);
    }

    #[test]
    fn test_no_feed_after_stop() {
        let dispatcher = make_dispatcher(&open_close_recording(), true);
        let mut rx = dispatcher.subscribe();
        dispatcher.start(ExerciseKind::OpenClose).unwrap();
        recv_feeds(&mut rx, 2);

        assert_eq!(dispatcher.stop(None), Some(ExerciseKind::OpenClose));
        while recv(&mut rx) != (ServerMessage::Stopped { exercise: ExerciseKind::OpenClose }) {}

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_frame_failures_are_skipped() {
        let dispatcher = make_dispatcher(&open_close_recording(), false);
        let mut rx = dispatcher.subscribe();
        dispatcher.start(ExerciseKind::OpenClose).unwrap();

        let feeds = recv_feeds(&mut rx, 2);
        assert_eq!(feeds[1].reading.count, 1);

        // Recording exhausted: the loop keeps running without emitting.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(dispatcher.active(), Some(ExerciseKind::OpenClose));
    }
}
