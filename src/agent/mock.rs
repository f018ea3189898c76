//! Simulated Data Factory Agent
//!
//! An in-process [`DataFactoryAgent`] for dry runs (`--simulate`) and tests. It
//! accepts every call, records it with the tokio clock instant, and can be told to
//! misbehave:
//!
//! - reject one named configuration field
//! - reject the n-th frame it receives
//! - fail or never answer the liveness probe
//!
//! Recording uses `tokio::time::Instant`, so tests running with a paused clock can
//! assert exact pacing. Only the most recent [`DEFAULT_HISTORY_LIMIT`] calls are kept
//! (see [`SimulatedAgent::with_history_limit`]); the frame and collection counters
//! cover the agent's whole lifetime.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{ConfigField, DataFactoryAgent, FrameSubmission, MechanismPosition, TimeValue};

/// Calls kept in the history unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 4096;

/// How the simulated agent answers `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PingBehavior {
    /// Answer immediately
    #[default]
    Answer,
    /// Return an error
    Fail,
    /// Never complete
    Hang,
}

/// A call observed by the simulated agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCall {
    Configure(ConfigField),
    SetMechanismPosition(MechanismPosition),
    CollectFrames,
    ReceiveFrame {
        source_id: String,
        width: u32,
        height: u32,
        payload_len: usize,
        timestamp: TimeValue,
        exposure: TimeValue,
    },
    Ping,
}

/// An [`AgentCall`] with the instant it was received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub call: AgentCall,
}

/// Simulated agent with call recording and failure injection.
pub struct SimulatedAgent {
    calls: Arc<RwLock<VecDeque<RecordedCall>>>,
    history_limit: usize,
    frames_received: AtomicU64,
    collections: AtomicU64,
    frame_attempts: AtomicU64,
    reject_field: Option<&'static str>,
    fail_frame: Option<u64>,
    ping: PingBehavior,
}

impl SimulatedAgent {
    /// Agent that accepts every call.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(VecDeque::new())),
            history_limit: DEFAULT_HISTORY_LIMIT,
            frames_received: AtomicU64::new(0),
            collections: AtomicU64::new(0),
            frame_attempts: AtomicU64::new(0),
            reject_field: None,
            fail_frame: None,
            ping: PingBehavior::Answer,
        }
    }

    /// Reject configuration of the field with this protocol name (see [`ConfigField::name`]).
    pub fn rejecting_field(mut self, field: &'static str) -> Self {
        self.reject_field = Some(field);
        self
    }

    /// Reject the n-th frame submission (1-based, counted over the agent's lifetime).
    pub fn failing_frame(mut self, nth: u64) -> Self {
        self.fail_frame = Some(nth);
        self
    }

    /// Change how `ping` is answered.
    pub fn with_ping(mut self, behavior: PingBehavior) -> Self {
        self.ping = behavior;
        self
    }

    /// Keep at most `limit` calls, dropping the oldest first.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Snapshot of the retained call history, oldest first.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.iter().cloned().collect()
    }

    /// Number of frames accepted.
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::SeqCst)
    }

    /// Number of `collectFrames` triggers received.
    pub async fn collection_count(&self) -> usize {
        self.collections.load(Ordering::SeqCst) as usize
    }

    async fn record(&self, call: AgentCall) {
        debug!(?call, "simulated agent call");
        if self.history_limit == 0 {
            return;
        }
        let mut calls = self.calls.write().await;
        while calls.len() >= self.history_limit {
            calls.pop_front();
        }
        calls.push_back(RecordedCall {
            at: Instant::now(),
            call,
        });
    }
}

impl Default for SimulatedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataFactoryAgent for SimulatedAgent {
    async fn configure(&self, field: &ConfigField) -> Result<()> {
        self.record(AgentCall::Configure(field.clone())).await;
        if self.reject_field == Some(field.name()) {
            bail!("field '{}' refused by simulated agent", field.name());
        }
        Ok(())
    }

    async fn set_mechanism_position(&self, position: &MechanismPosition) -> Result<()> {
        self.record(AgentCall::SetMechanismPosition(position.clone()))
            .await;
        Ok(())
    }

    async fn collect_frames(&self) -> Result<()> {
        self.record(AgentCall::CollectFrames).await;
        self.collections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn receive_frame(&self, submission: &FrameSubmission) -> Result<()> {
        let attempt = self.frame_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_frame == Some(attempt) {
            bail!("frame {attempt} refused by simulated agent");
        }
        self.record(AgentCall::ReceiveFrame {
            source_id: submission.source_id.clone(),
            width: submission.frame.width,
            height: submission.frame.height,
            payload_len: submission.frame.data.len(),
            timestamp: submission.timestamp,
            exposure: submission.exposure,
        })
        .await;
        self.frames_received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.record(AgentCall::Ping).await;
        match self.ping {
            PingBehavior::Answer => Ok(()),
            PingBehavior::Fail => bail!("transient failure while pinging"),
            PingBehavior::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Frame, Mechanism};
    use bytes::Bytes;

    fn submission() -> FrameSubmission {
        FrameSubmission {
            frame: Frame {
                width: 2,
                height: 2,
                bitpix: 16,
                data: Bytes::from_static(&[0; 8]),
            },
            current_window: 1,
            total_windows: 1,
            top_left: (0, 0),
            bottom_right: (2, 2),
            timestamp: TimeValue::from_micros(1),
            exposure: TimeValue::from_micros(0),
            source_id: "MIRADAS".into(),
        }
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let agent = SimulatedAgent::new();
        agent
            .configure(&ConfigField::ObjectName("M3".into()))
            .await
            .unwrap();
        agent
            .set_mechanism_position(&MechanismPosition::new(Mechanism::Filter, "F"))
            .await
            .unwrap();
        agent.collect_frames().await.unwrap();

        let calls = agent.calls().await;
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].call, AgentCall::CollectFrames);
        assert_eq!(agent.collection_count().await, 1);
    }

    #[tokio::test]
    async fn rejects_named_field() {
        let agent = SimulatedAgent::new().rejecting_field("object_name");
        assert!(agent
            .configure(&ConfigField::ImageTitle("Load test".into()))
            .await
            .is_ok());
        assert!(agent
            .configure(&ConfigField::ObjectName("M3".into()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn fails_nth_frame_only() {
        let agent = SimulatedAgent::new().failing_frame(2);
        assert!(agent.receive_frame(&submission()).await.is_ok());
        assert!(agent.receive_frame(&submission()).await.is_err());
        assert!(agent.receive_frame(&submission()).await.is_ok());
        assert_eq!(agent.frames_received(), 2);
    }

    #[tokio::test]
    async fn history_is_bounded_but_counters_are_not() {
        let agent = SimulatedAgent::new().with_history_limit(3);
        for _ in 0..5 {
            agent.collect_frames().await.unwrap();
            agent.receive_frame(&submission()).await.unwrap();
        }

        let calls = agent.calls().await;
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[2].call, AgentCall::ReceiveFrame { .. }));
        assert_eq!(agent.collection_count().await, 5);
        assert_eq!(agent.frames_received(), 5);
    }

    #[tokio::test]
    async fn zero_limit_disables_recording() {
        let agent = SimulatedAgent::new().with_history_limit(0);
        agent.ping().await.unwrap();
        agent.collect_frames().await.unwrap();
        assert!(agent.calls().await.is_empty());
        assert_eq!(agent.collection_count().await, 1);
    }
}
