//! Progress events published while a run is in flight.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel. Publishing never
//! blocks and never fails; with no subscribers an event is dropped.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use scenechain_core::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub run_id: Uuid,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl PipelineEvent {
    pub fn new(run_id: Uuid, kind: EventKind) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// A generation job was accepted by the service.
    SceneSubmitted {
        position: u64,
        job_id: JobId,
        with_reference: bool,
        remix: bool,
    },
    /// A clip was published into the run.
    SceneCompleted {
        position: u64,
        sequence_index: u32,
        video: PathBuf,
        reference_frame: Option<PathBuf>,
    },
    /// The last frame could not be extracted; the next scene will not be
    /// conditioned on this clip.
    ContinuityDegraded {
        position: u64,
        video: PathBuf,
        reason: String,
    },
    AssemblyCompleted { clips: usize, output: PathBuf },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel for [`PipelineEvent`]s. Share via `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Slow receivers observe `RecvError::Lagged` once `capacity` events
    /// are buffered.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // Err only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
