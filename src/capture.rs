//! Capture sessions
//!
//! A [`CaptureSession`] owns the pre/post windows of all three sensor streams
//! and the phase switch that decides where new samples land. Producers (sensor
//! callbacks on any thread) either hand readings in directly with
//! [`CaptureSession::on_sample`] or push them through a per-stream bounded
//! queue obtained from [`CaptureSession::sender`].
//!
//! Locking: each stream's windows sit behind their own mutex, so streams never
//! wait on each other during ingestion. The phase is an `RwLock` that ingestion
//! holds shared and the phase transitions hold exclusively, which makes every
//! transition a clean cut: a sample is either entirely before it or entirely
//! after it.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::features::{CaptureSnapshot, FeatureVectorBuilder, PhaseSnapshot};
use crate::types::{FeatureVector, Sample, SensorReading, SensorStreamId};
use crate::window::{Phase, PhaseWindows};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

struct StreamLane {
    windows: Mutex<PhaseWindows>,
    sender: Sender<Sample>,
    receiver: Receiver<Sample>,
}

impl StreamLane {
    fn new(window_capacity: usize, channel_capacity: usize) -> Self {
        let (sender, receiver) = bounded(channel_capacity);
        Self {
            windows: Mutex::new(PhaseWindows::new(window_capacity)),
            sender,
            receiver,
        }
    }

    /// Move queued samples into `windows`; caller holds the lane lock
    fn drain_into(&self, windows: &mut PhaseWindows, phase: Phase) -> usize {
        let mut moved = 0;
        while let Ok(sample) = self.receiver.try_recv() {
            windows.push(phase, sample);
            moved += 1;
        }
        moved
    }
}

/// Buffers and phase state for one stream of user actions
pub struct CaptureSession {
    lanes: [StreamLane; 3],
    phase: RwLock<Phase>,
    dropped: Arc<AtomicU64>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(&AuthConfig::default())
    }
}

impl CaptureSession {
    /// Build a session from an already validated configuration.
    ///
    /// Queues are allocated up front, so oversized capacities must be rejected
    /// first; [`CaptureSession::try_new`] does that.
    pub fn new(config: &AuthConfig) -> Self {
        let lane = || StreamLane::new(config.window_capacity, config.channel_capacity);
        Self {
            lanes: [lane(), lane(), lane()],
            phase: RwLock::new(Phase::Pre),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Validate `config`, then build the session
    pub fn try_new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    fn lane(&self, stream: SensorStreamId) -> &StreamLane {
        &self.lanes[stream.index()]
    }

    /// Producer handle for one stream's ingestion queue
    pub fn sender(&self, stream: SensorStreamId) -> SensorSender {
        SensorSender {
            stream,
            sender: self.lane(stream).sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Ingest a reading synchronously.
    ///
    /// Samples already queued for the same stream are drained first so the
    /// window keeps arrival order.
    pub fn on_sample(&self, reading: SensorReading) -> Result<(), AuthError> {
        let sample = Sample::from_axes(reading.values)?;
        let phase = self.phase.read();
        let lane = self.lane(reading.stream);
        let mut windows = lane.windows.lock();
        lane.drain_into(&mut windows, *phase);
        windows.push(*phase, sample);
        Ok(())
    }

    /// Move every queued sample into the windows of the current phase
    pub fn drain(&self) -> usize {
        let phase = self.phase.read();
        self.lanes
            .iter()
            .map(|lane| lane.drain_into(&mut lane.windows.lock(), *phase))
            .sum()
    }

    /// Close the pre-action phase; subsequent samples land in the post windows
    pub fn begin_capture(&self) -> Result<(), AuthError> {
        let mut phase = self.phase.write();
        if *phase == Phase::Post {
            return Err(AuthError::PrematureStateTransition {
                operation: "begin capture",
                state: "a capture is already in progress".to_string(),
            });
        }
        for lane in &self.lanes {
            lane.drain_into(&mut lane.windows.lock(), Phase::Pre);
        }
        *phase = Phase::Post;
        debug!("capture phase started");
        Ok(())
    }

    /// Close the capture, build its feature vector and reset every window.
    ///
    /// Queued samples are attributed to the post phase before the cut.
    pub fn end_capture(&self) -> Result<FeatureVector, AuthError> {
        let mut phase = self.phase.write();
        if *phase == Phase::Pre {
            return Err(AuthError::PrematureStateTransition {
                operation: "end capture",
                state: "no capture is in progress".to_string(),
            });
        }

        let mut snapshot = CaptureSnapshot::default();
        for (lane, slot) in self.lanes.iter().zip(snapshot.iter_mut()) {
            let mut windows = lane.windows.lock();
            lane.drain_into(&mut windows, Phase::Post);
            *slot = PhaseSnapshot {
                pre: windows.pre.snapshot(),
                post: windows.post.snapshot(),
            };
            windows.clear();
        }
        *phase = Phase::Pre;
        drop(phase);

        let vector = FeatureVectorBuilder::build(&snapshot);
        debug!(
            pre_samples = snapshot.iter().map(|s| s.pre.len()).sum::<usize>(),
            post_samples = snapshot.iter().map(|s| s.post.len()).sum::<usize>(),
            "capture phase closed"
        );
        Ok(vector)
    }

    /// Discard every buffered and queued sample and leave capture mode
    pub fn reset(&self) {
        let mut phase = self.phase.write();
        for lane in &self.lanes {
            let mut windows = lane.windows.lock();
            while lane.receiver.try_recv().is_ok() {}
            windows.clear();
        }
        *phase = Phase::Pre;
    }

    pub fn is_capturing(&self) -> bool {
        *self.phase.read() == Phase::Post
    }

    /// Current window contents of one stream (queued samples not included)
    pub fn snapshot(&self, stream: SensorStreamId) -> PhaseSnapshot {
        let windows = self.lane(stream).windows.lock();
        PhaseSnapshot {
            pre: windows.pre.snapshot(),
            post: windows.post.snapshot(),
        }
    }

    /// Samples waiting in a stream's queue
    pub fn pending(&self, stream: SensorStreamId) -> usize {
        self.lane(stream).receiver.len()
    }

    /// Samples shed because a stream's queue was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Cloneable producer handle for one sensor stream
#[derive(Clone)]
pub struct SensorSender {
    stream: SensorStreamId,
    sender: Sender<Sample>,
    dropped: Arc<AtomicU64>,
}

impl SensorSender {
    pub fn stream(&self) -> SensorStreamId {
        self.stream
    }

    /// Enqueue raw axis values without blocking.
    ///
    /// Returns `Ok(false)` when the queue is full and the sample was shed.
    pub fn offer(&self, values: [f32; 3]) -> Result<bool, AuthError> {
        let sample = Sample::from_axes(values)?;
        match self.sender.try_send(sample) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(stream = self.stream.as_str(), total, "ingestion queue full, sample shed");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(AuthError::SessionClosed(self.stream.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatisticsExtractor;
    use std::thread;

    fn reading(stream: SensorStreamId, x: f32) -> SensorReading {
        SensorReading::new(stream, [x, 0.0, 0.0])
    }

    #[test]
    fn test_phase_routing() {
        let session = CaptureSession::default();
        session.on_sample(reading(SensorStreamId::Accelerometer, 1.0)).unwrap();

        session.begin_capture().unwrap();
        assert!(session.is_capturing());
        session.on_sample(reading(SensorStreamId::Accelerometer, 5.0)).unwrap();
        session.on_sample(reading(SensorStreamId::Accelerometer, 7.0)).unwrap();

        let snapshot = session.snapshot(SensorStreamId::Accelerometer);
        assert_eq!(snapshot.pre.len(), 1);
        assert_eq!(snapshot.post.len(), 2);
    }

    #[test]
    fn test_end_capture_builds_vector_and_resets() {
        let session = CaptureSession::default();
        session.on_sample(reading(SensorStreamId::Gyroscope, 1.0)).unwrap();
        session.on_sample(reading(SensorStreamId::Gyroscope, 3.0)).unwrap();
        session.begin_capture().unwrap();
        session.on_sample(reading(SensorStreamId::Gyroscope, 4.0)).unwrap();

        let vector = session.end_capture().unwrap();
        assert!(!session.is_capturing());

        // Gyroscope pre X mean lives at 48, post X mean at 64
        assert_eq!(vector.as_slice()[48], 2.0);
        assert_eq!(vector.as_slice()[64], 4.0);
        // Diff X mean
        assert_eq!(vector.as_slice()[80], 2.0);

        for stream in SensorStreamId::ALL {
            let snapshot = session.snapshot(stream);
            assert!(snapshot.pre.is_empty() && snapshot.post.is_empty());
        }
    }

    #[test]
    fn test_transitions_out_of_order() {
        let session = CaptureSession::default();
        assert!(matches!(
            session.end_capture(),
            Err(AuthError::PrematureStateTransition { .. })
        ));

        session.begin_capture().unwrap();
        assert!(matches!(
            session.begin_capture(),
            Err(AuthError::PrematureStateTransition { .. })
        ));
    }

    #[test]
    fn test_queued_samples_attributed_at_transition() {
        let session = CaptureSession::default();
        let sender = session.sender(SensorStreamId::Magnetometer);

        sender.offer([1.0, 0.0, 0.0]).unwrap();
        sender.offer([2.0, 0.0, 0.0]).unwrap();
        assert_eq!(session.pending(SensorStreamId::Magnetometer), 2);

        // Queued before the action: belongs to the pre phase
        session.begin_capture().unwrap();
        sender.offer([10.0, 0.0, 0.0]).unwrap();

        let vector = session.end_capture().unwrap();
        let values = vector.as_slice();
        assert_eq!(values[96], 1.5);
        assert_eq!(values[96 + 16], 10.0);
    }

    #[test]
    fn test_try_new_rejects_oversized_queues() {
        let config = AuthConfig {
            channel_capacity: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            CaptureSession::try_new(&config),
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(CaptureSession::try_new(&AuthConfig::default()).is_ok());
    }

    #[test]
    fn test_full_queue_sheds_samples() {
        let config = AuthConfig {
            channel_capacity: 2,
            ..Default::default()
        };
        let session = CaptureSession::new(&config);
        let sender = session.sender(SensorStreamId::Accelerometer);

        assert!(sender.offer([1.0, 0.0, 0.0]).unwrap());
        assert!(sender.offer([2.0, 0.0, 0.0]).unwrap());
        assert!(!sender.offer([3.0, 0.0, 0.0]).unwrap());
        assert_eq!(session.dropped_samples(), 1);

        assert_eq!(session.drain(), 2);
        assert!(sender.offer([3.0, 0.0, 0.0]).unwrap());
    }

    #[test]
    fn test_invalid_sample_rejected() {
        let session = CaptureSession::default();
        let result = session.on_sample(SensorReading::new(
            SensorStreamId::Accelerometer,
            [f32::NAN, 0.0, 0.0],
        ));
        assert!(matches!(result, Err(AuthError::InvalidSample(_))));
        assert!(session.snapshot(SensorStreamId::Accelerometer).pre.is_empty());
    }

    #[test]
    fn test_reset_discards_everything() {
        let session = CaptureSession::default();
        session.sender(SensorStreamId::Gyroscope).offer([1.0, 1.0, 1.0]).unwrap();
        session.on_sample(reading(SensorStreamId::Accelerometer, 2.0)).unwrap();
        session.begin_capture().unwrap();

        session.reset();
        assert!(!session.is_capturing());
        assert_eq!(session.pending(SensorStreamId::Gyroscope), 0);
        assert!(session.snapshot(SensorStreamId::Accelerometer).pre.is_empty());
    }

    #[test]
    fn test_concurrent_producers_keep_windows_bounded() {
        let session = Arc::new(CaptureSession::default());

        let handles: Vec<_> = SensorStreamId::ALL
            .into_iter()
            .map(|stream| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for i in 0..500 {
                        session.on_sample(reading(stream, i as f32)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for stream in SensorStreamId::ALL {
            let snapshot = session.snapshot(stream);
            assert_eq!(snapshot.pre.len(), 10);
            // Last ten arrivals in order: 490..=499
            let mean = StatisticsExtractor::mean(&snapshot.pre);
            assert_eq!(mean[0], 494.5);
        }
    }
}
