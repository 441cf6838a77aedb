//! Per-run clip ledger and continuity reference.
//!
//! A [`RunContext`] is created at run start and is append-only for its
//! lifetime. Clips are published strictly in the order their slots were
//! reserved, so concurrent scene producers cannot reorder the final cut by
//! finishing early.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::JobId;
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// ContinuityPolicy
// ---------------------------------------------------------------------------

/// What happens to the continuity reference when a clip is appended
/// without an extracted frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityPolicy {
    /// Drop the reference; the next scene is generated without one.
    #[default]
    Reset,
    /// Keep the last successfully extracted reference (or the starter).
    CarryForward,
}

impl FromStr for ContinuityPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "carry_forward" | "carry-forward" => Ok(Self::CarryForward),
            other => Err(CoreError::Validation(format!(
                "Unknown continuity policy '{other}'. Must be one of: reset, carry_forward"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

/// One finished scene recorded in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Position in the final cut, contiguous from 0.
    pub sequence_index: u32,
    pub video_asset_path: PathBuf,
    /// Last frame of the clip, if extraction succeeded.
    pub reference_frame_path: Option<PathBuf>,
    /// Service job that produced the clip.
    pub job_id: Option<JobId>,
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Ordered clip list and continuity reference for exactly one run.
pub struct RunContext {
    run_id: Uuid,
    workspace: Workspace,
    policy: ContinuityPolicy,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<RunState>,
    published: Notify,
}

#[derive(Default)]
struct RunState {
    clips: Vec<Clip>,
    current_reference: Option<PathBuf>,
    /// Next slot position handed out by `reserve_slot`.
    next_slot: u64,
    /// Lowest slot position not yet published or abandoned.
    next_publish: u64,
    pending: BTreeMap<u64, PendingSlot>,
    /// Slot position -> index into `clips`.
    published_at: HashMap<u64, usize>,
}

enum PendingSlot {
    Ready(ClipRecord),
    Abandoned,
}

struct ClipRecord {
    video_asset_path: PathBuf,
    reference_frame_path: Option<PathBuf>,
    job_id: Option<JobId>,
}

impl RunState {
    /// Publish every contiguous slot starting at `next_publish`.
    ///
    /// Returns `true` if at least one slot was resolved.
    fn drain(&mut self, policy: ContinuityPolicy) -> bool {
        let mut progressed = false;
        while let Some(slot) = self.pending.remove(&self.next_publish) {
            if let PendingSlot::Ready(record) = slot {
                match (&record.reference_frame_path, policy) {
                    (Some(frame), _) => self.current_reference = Some(frame.clone()),
                    (None, ContinuityPolicy::Reset) => self.current_reference = None,
                    (None, ContinuityPolicy::CarryForward) => {}
                }
                let sequence_index = self.clips.len() as u32;
                self.published_at.insert(self.next_publish, self.clips.len());
                self.clips.push(Clip {
                    sequence_index,
                    video_asset_path: record.video_asset_path,
                    reference_frame_path: record.reference_frame_path,
                    job_id: record.job_id,
                });
            }
            self.next_publish += 1;
            progressed = true;
        }
        progressed
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunContext {
    /// Start a run rooted at `workspace_root`.
    ///
    /// `starter_reference`, if given, is used as the continuity reference
    /// for the first scene.
    pub fn create(workspace_root: impl Into<PathBuf>, starter_reference: Option<PathBuf>) -> Self {
        Self::from_workspace(Workspace::new(workspace_root), starter_reference)
    }

    pub fn from_workspace(workspace: Workspace, starter_reference: Option<PathBuf>) -> Self {
        let state = RunState {
            current_reference: starter_reference,
            ..Default::default()
        };
        Self {
            run_id: Uuid::new_v4(),
            workspace,
            policy: ContinuityPolicy::default(),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                published: Notify::new(),
            }),
        }
    }

    /// Set the continuity policy. Intended for use right after creation.
    pub fn with_policy(mut self, policy: ContinuityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn policy(&self) -> ContinuityPolicy {
        self.policy
    }

    /// Image to feed into the next generation job, if any.
    pub fn current_reference(&self) -> Option<PathBuf> {
        lock(&self.shared.state).current_reference.clone()
    }

    /// Job id of the most recently published clip.
    pub fn last_job_id(&self) -> Option<JobId> {
        lock(&self.shared.state)
            .clips
            .last()
            .and_then(|c| c.job_id.clone())
    }

    /// Published clips in `sequence_index` order.
    pub fn ordered_clips(&self) -> Vec<Clip> {
        lock(&self.shared.state).clips.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.state).clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve the next publication slot.
    ///
    /// Slots are published in reservation order. A ticket dropped without
    /// [`SlotTicket::commit`] is abandoned and leaves the clip list as it
    /// was.
    pub fn reserve_slot(&self) -> SlotTicket {
        let position = {
            let mut state = lock(&self.shared.state);
            let position = state.next_slot;
            state.next_slot += 1;
            position
        };
        SlotTicket {
            position,
            policy: self.policy,
            shared: Arc::clone(&self.shared),
            committed: false,
        }
    }

    /// Append a clip as the next element of the run.
    ///
    /// If `reference_frame_path` is present it becomes the continuity
    /// reference; otherwise the reference follows the context's
    /// [`ContinuityPolicy`]. Waits behind any earlier reserved slot.
    pub async fn append_clip(
        &self,
        video_asset_path: impl Into<PathBuf>,
        reference_frame_path: Option<PathBuf>,
    ) -> Clip {
        self.reserve_slot()
            .commit(video_asset_path, reference_frame_path, None)
            .await
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("workspace", &self.workspace)
            .field("policy", &self.policy)
            .field("clips", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SlotTicket
// ---------------------------------------------------------------------------

/// A reserved position in a run's publication order.
#[must_use = "dropping a ticket abandons its slot"]
pub struct SlotTicket {
    position: u64,
    policy: ContinuityPolicy,
    shared: Arc<Shared>,
    committed: bool,
}

impl SlotTicket {
    /// Reservation order of this slot. Encoded into workspace filenames.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Wait until every earlier slot has been published or abandoned.
    ///
    /// Nothing is recorded while waiting, so a caller can race this against
    /// cancellation and drop the ticket to abandon the slot. After it
    /// returns, [`commit`](Self::commit) publishes without waiting.
    pub async fn wait_turn(&self) {
        loop {
            let notified = self.shared.published.notified();
            if lock(&self.shared.state).next_publish >= self.position {
                return;
            }
            notified.await;
        }
    }

    /// Record the finished clip for this slot and wait for it to be
    /// published.
    ///
    /// Publication waits until every earlier slot has been committed or
    /// abandoned, so the returned [`Clip`] carries its final
    /// `sequence_index`. Once called, the clip will be published; there is
    /// no way to withdraw it.
    pub async fn commit(
        mut self,
        video_asset_path: impl Into<PathBuf>,
        reference_frame_path: Option<PathBuf>,
        job_id: Option<JobId>,
    ) -> Clip {
        let record = ClipRecord {
            video_asset_path: video_asset_path.into(),
            reference_frame_path,
            job_id,
        };
        self.committed = true;
        self.resolve(PendingSlot::Ready(record));

        loop {
            let notified = self.shared.published.notified();
            {
                let state = lock(&self.shared.state);
                if let Some(&idx) = state.published_at.get(&self.position) {
                    return state.clips[idx].clone();
                }
            }
            notified.await;
        }
    }

    fn resolve(&self, slot: PendingSlot) {
        let progressed = {
            let mut state = lock(&self.shared.state);
            state.pending.insert(self.position, slot);
            state.drain(self.policy)
        };
        if progressed {
            self.shared.published.notify_waiters();
        }
    }
}

impl Drop for SlotTicket {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(position = self.position, "Clip slot abandoned");
            self.resolve(PendingSlot::Abandoned);
        }
    }
}
