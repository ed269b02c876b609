//! Save synchronization between the local and cloud replicas.
//!
//! [`SyncOrchestrator`] drives one cycle at a time through the phases in
//! [`SyncPhase`]: read the local save, fetch the cloud metadata, compare,
//! resolve a conflict when there is one, then apply the result. Local writes
//! always happen before cloud writes, so the worst case after a failure is
//! "cloud not yet updated".

mod cancel;
mod detect;
mod policy;
mod prompt;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::Instrument;
use uuid::Uuid;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use detect::{detect, diverging_fields};
pub use policy::{resolve, ResolvedOutcome};
pub use prompt::{ChannelPrompt, ConflictPrompt, ConflictRequest, FixedPrompt};

use crate::config::SyncConfig;
use crate::error::Error;
use crate::models::{
    ConflictResolution, ResolutionChoice, SaveBlob, SaveConflict, SaveMetadata, SaveOrigin,
    SyncPreference,
};
use crate::state::SyncPhase;
use crate::storage::{CloudError, CloudResult, CloudStore, LocalSaveStore, PreferenceStore};

/// Errors that end a sync cycle
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A sync is already in progress")]
    SyncAlreadyInProgress,

    /// The local save is unreadable and no backup passed the integrity check
    #[error("Local save could not be read: {0}")]
    LocalRead(#[source] Error),

    /// The cloud refused the upload; the local save is untouched and authoritative
    #[error("Cloud quota exceeded ({required} bytes needed, {limit} allowed); local save kept")]
    QuotaExceeded { required: u64, limit: u64 },

    #[error("Sync failed while {step}: {source}")]
    Failed {
        step: SyncPhase,
        #[source]
        source: Error,
    },
}

/// Where an applied resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The remembered strategy
    Preference,
    /// The conflict UI
    Prompt,
}

/// How a sync cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Both sides already matched; nothing was written
    InSync,
    /// Neither side has a save yet
    NoSaves,
    /// Only a local save existed and it was uploaded
    Pushed,
    /// Only a cloud save existed and it was downloaded
    Pulled,
    /// A conflict was resolved in favour of `winner`
    Resolved {
        winner: SaveOrigin,
        source: ResolutionSource,
        /// The local side holds the winner but the cloud write did not land
        cloud_pending: bool,
    },
    /// The conflict was cancelled; both stores are untouched
    Deferred { conflict: SaveConflict },
    /// Nobody answered in time; both stores are untouched
    ResolutionTimedOut { conflict: SaveConflict },
    /// The cloud could not be reached; play continues on the local save
    LocalOnly { reason: String },
}

impl SyncOutcome {
    /// Both stores carry identical metadata after this outcome.
    pub const fn is_synced(&self) -> bool {
        match self {
            Self::InSync | Self::NoSaves | Self::Pushed | Self::Pulled => true,
            Self::Resolved { cloud_pending, .. } => !*cloud_pending,
            Self::Deferred { .. } | Self::ResolutionTimedOut { .. } | Self::LocalOnly { .. } => {
                false
            }
        }
    }
}

/// Result of a completed sync cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub cycle_id: Uuid,
    pub outcome: SyncOutcome,
    /// The active local save was unreadable and got replaced from a backup
    pub recovered_from_backup: bool,
}

/// Per-call limits for one sync cycle
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Bound on every cloud call in the cycle
    pub cloud_timeout: Option<Duration>,
    /// Bound on waiting for the conflict UI
    pub resolution_timeout: Option<Duration>,
    pub cancel: Option<CancelSignal>,
}

impl SyncRequest {
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self {
            cloud_timeout: config.cloud_timeout,
            resolution_timeout: config.resolution_timeout,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_cloud_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cloud_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_resolution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

enum Bounded<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

async fn bounded<F: Future>(
    future: F,
    timeout: Option<Duration>,
    cancel: Option<&CancelSignal>,
) -> Bounded<F::Output> {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = async {
        match cancel {
            Some(cancel) => cancel.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        () = cancelled => Bounded::Cancelled,
        output = future => Bounded::Completed(output),
        () = deadline => Bounded::TimedOut,
    }
}

/// Returns the phase to `Idle` if a cycle's future is dropped before it finishes.
struct PhaseReset<'a> {
    phase: &'a watch::Sender<SyncPhase>,
    cycle_id: Uuid,
    armed: bool,
}

impl<'a> PhaseReset<'a> {
    const fn new(phase: &'a watch::Sender<SyncPhase>, cycle_id: Uuid) -> Self {
        Self {
            phase,
            cycle_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let abandoned = self.phase.send_if_modified(|phase| {
            let busy = phase.is_busy();
            if busy {
                *phase = SyncPhase::Idle;
            }
            busy
        });
        if abandoned {
            tracing::warn!(
                cycle_id = %self.cycle_id,
                "Sync cycle dropped before finishing; phase reset to idle"
            );
        }
    }
}

enum Awaited {
    Chosen(ResolutionChoice),
    TimedOut,
    Dismissed,
}

/// Drives sync cycles over injected local, cloud, preference and prompt collaborators.
///
/// Cycles are serialized: a request made while one is running is rejected
/// with [`SyncError::SyncAlreadyInProgress`].
pub struct SyncOrchestrator<L, C, P, U> {
    local: L,
    cloud: C,
    preferences: P,
    prompt: U,
    phase: watch::Sender<SyncPhase>,
    in_flight: Mutex<()>,
}

impl<L, C, P, U> SyncOrchestrator<L, C, P, U>
where
    L: LocalSaveStore,
    C: CloudStore,
    P: PreferenceStore,
    U: ConflictPrompt,
{
    pub fn new(local: L, cloud: C, preferences: P, prompt: U) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            local,
            cloud,
            preferences,
            prompt,
            phase,
            in_flight: Mutex::new(()),
        }
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn cloud(&self) -> &C {
        &self.cloud
    }

    pub const fn preferences(&self) -> &P {
        &self.preferences
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Observe every phase transition.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Run one full sync cycle.
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("Rejected sync request: a sync is already in progress");
            return Err(SyncError::SyncAlreadyInProgress);
        };

        let cycle_id = Uuid::now_v7();
        let reset = PhaseReset::new(&self.phase, cycle_id);
        let span = tracing::info_span!("sync", %cycle_id);
        let result = self.run_cycle(cycle_id, request).instrument(span).await;
        reset.disarm();

        match &result {
            Ok(report) => {
                tracing::info!(%cycle_id, "Sync finished: {:?}", report.outcome);
            }
            Err(SyncError::QuotaExceeded { .. }) => {
                tracing::warn!(%cycle_id, "Cloud quota exceeded; local save kept");
                self.set_phase(SyncPhase::Idle);
            }
            Err(error) => {
                tracing::error!(%cycle_id, "Sync failed: {}", error);
                self.set_phase(SyncPhase::Failed);
            }
        }
        result
    }

    async fn run_cycle(
        &self,
        cycle_id: Uuid,
        request: &SyncRequest,
    ) -> Result<SyncReport, SyncError> {
        self.set_phase(SyncPhase::CheckingLocal);
        let (local, recovered_from_backup) = self.load_local()?;

        self.set_phase(SyncPhase::CheckingCloud);
        let fetched = self
            .cloud_call(request, "fetch cloud metadata", self.cloud.fetch_metadata())
            .await;
        let cloud = match fetched {
            Ok(metadata) => Some(metadata),
            Err(CloudError::NotFound) => None,
            Err(error) => {
                tracing::warn!("Continuing in local-only mode: {}", error);
                return Ok(self.finish(
                    cycle_id,
                    SyncOutcome::LocalOnly {
                        reason: error.to_string(),
                    },
                    recovered_from_backup,
                ));
            }
        };

        self.set_phase(SyncPhase::Comparing);
        let outcome = match (local, cloud) {
            (None, None) => SyncOutcome::NoSaves,
            (Some(local), None) => self.push(request, &local).await?,
            (None, Some(cloud)) => self.pull(request, &cloud).await?,
            (Some(local), Some(cloud)) => match detect(local.metadata(), &cloud) {
                None => SyncOutcome::InSync,
                Some(conflict) => self.resolve_conflict(request, &local, conflict).await?,
            },
        };

        Ok(self.finish(cycle_id, outcome, recovered_from_backup))
    }

    fn load_local(&self) -> Result<(Option<SaveBlob>, bool), SyncError> {
        match self.local.read_local() {
            Ok(save) => Ok((save, false)),
            Err(error) if error.is_corruption() => {
                tracing::warn!("Local save is corrupt, trying backups: {}", error);
                match self.local.recover_last_good() {
                    Ok(Some(recovered)) => Ok((Some(recovered), true)),
                    Ok(None) => Err(SyncError::LocalRead(error)),
                    Err(recovery_error) => Err(self.failed(recovery_error)),
                }
            }
            Err(error) => Err(SyncError::LocalRead(error)),
        }
    }

    async fn push(&self, request: &SyncRequest, local: &SaveBlob) -> Result<SyncOutcome, SyncError> {
        tracing::info!("No cloud save; uploading local save");
        match self
            .cloud_call(request, "upload local save", self.cloud.upload(local))
            .await
        {
            Ok(()) => Ok(SyncOutcome::Pushed),
            Err(CloudError::QuotaExceeded { required, limit }) => {
                Err(SyncError::QuotaExceeded { required, limit })
            }
            Err(error) => Ok(SyncOutcome::LocalOnly {
                reason: error.to_string(),
            }),
        }
    }

    async fn pull(
        &self,
        request: &SyncRequest,
        expected: &SaveMetadata,
    ) -> Result<SyncOutcome, SyncError> {
        tracing::info!("No local save; downloading cloud save");
        let blob = match self.download_expected(request, expected).await {
            Ok(blob) => blob,
            Err(reason) => return Ok(SyncOutcome::LocalOnly { reason }),
        };
        self.local
            .write_local(&blob)
            .map_err(|error| self.failed(error))?;
        Ok(SyncOutcome::Pulled)
    }

    async fn resolve_conflict(
        &self,
        request: &SyncRequest,
        local: &SaveBlob,
        conflict: SaveConflict,
    ) -> Result<SyncOutcome, SyncError> {
        self.set_phase(SyncPhase::ConflictDetected);
        tracing::info!(
            "Local and cloud saves diverge in {}",
            diverging_fields(&conflict.local, &conflict.cloud).join(", ")
        );

        let (resolution, source) = if let Some(preference) = self.stored_preference() {
            tracing::info!("Resolving with remembered strategy {}", preference);
            (ConflictResolution::from(preference), ResolutionSource::Preference)
        } else {
            self.set_phase(SyncPhase::AwaitingResolution);
            match self.await_choice(request, &conflict).await {
                Awaited::Chosen(choice) => {
                    if choice.remember {
                        self.remember(choice.resolution);
                    }
                    (choice.resolution, ResolutionSource::Prompt)
                }
                Awaited::Dismissed => (ConflictResolution::Cancel, ResolutionSource::Prompt),
                Awaited::TimedOut => {
                    tracing::info!("No resolution chosen in time; leaving both saves untouched");
                    return Ok(SyncOutcome::ResolutionTimedOut { conflict });
                }
            }
        };

        let Some(winner) = resolve(&conflict, resolution).winner() else {
            tracing::info!("Conflict resolution deferred");
            return Ok(SyncOutcome::Deferred { conflict });
        };

        self.set_phase(SyncPhase::Applying);
        tracing::info!("Keeping {} save ({})", winner, resolution);
        self.apply(request, winner, source, local, &conflict).await
    }

    async fn apply(
        &self,
        request: &SyncRequest,
        winner: SaveOrigin,
        source: ResolutionSource,
        local: &SaveBlob,
        conflict: &SaveConflict,
    ) -> Result<SyncOutcome, SyncError> {
        match winner {
            SaveOrigin::Cloud => {
                // the cloud already holds the winner; only the local side changes
                let blob = match self.download_expected(request, &conflict.cloud).await {
                    Ok(blob) => blob,
                    Err(reason) => return Ok(SyncOutcome::LocalOnly { reason }),
                };
                self.local
                    .write_local(&blob)
                    .map_err(|error| self.failed(error))?;
                Ok(SyncOutcome::Resolved {
                    winner,
                    source,
                    cloud_pending: false,
                })
            }
            SaveOrigin::Local => {
                // the local side already holds the winner; only the cloud changes
                match self
                    .cloud_call(request, "upload winning save", self.cloud.upload(local))
                    .await
                {
                    Ok(()) => Ok(SyncOutcome::Resolved {
                        winner,
                        source,
                        cloud_pending: false,
                    }),
                    Err(CloudError::QuotaExceeded { required, limit }) => {
                        Err(SyncError::QuotaExceeded { required, limit })
                    }
                    Err(error) => {
                        tracing::warn!("Cloud not updated, will retry next sync: {}", error);
                        Ok(SyncOutcome::Resolved {
                            winner,
                            source,
                            cloud_pending: true,
                        })
                    }
                }
            }
        }
    }

    /// Download the cloud save, insisting it is the one that was compared.
    async fn download_expected(
        &self,
        request: &SyncRequest,
        expected: &SaveMetadata,
    ) -> Result<SaveBlob, String> {
        let blob = self
            .cloud_call(request, "download cloud save", self.cloud.download())
            .await
            .map_err(|error| {
                tracing::warn!("Cloud download failed: {}", error);
                error.to_string()
            })?;

        if blob.metadata() != expected {
            tracing::warn!("Cloud save changed during sync; deferring to the next cycle");
            return Err("cloud save changed during sync".to_string());
        }
        Ok(blob)
    }

    async fn await_choice(&self, request: &SyncRequest, conflict: &SaveConflict) -> Awaited {
        match bounded(
            self.prompt.choose(conflict),
            request.resolution_timeout,
            request.cancel.as_ref(),
        )
        .await
        {
            Bounded::Completed(Some(choice)) => Awaited::Chosen(choice),
            Bounded::Completed(None) | Bounded::Cancelled => Awaited::Dismissed,
            Bounded::TimedOut => Awaited::TimedOut,
        }
    }

    async fn cloud_call<T>(
        &self,
        request: &SyncRequest,
        operation: &str,
        call: impl Future<Output = CloudResult<T>>,
    ) -> CloudResult<T> {
        match bounded(call, request.cloud_timeout, request.cancel.as_ref()).await {
            Bounded::Completed(result) => result,
            Bounded::TimedOut => Err(CloudError::Unavailable(format!("{operation} timed out"))),
            Bounded::Cancelled => Err(CloudError::Unavailable(format!("{operation} cancelled"))),
        }
    }

    fn stored_preference(&self) -> Option<SyncPreference> {
        match self.preferences.load() {
            Ok(preference) => preference,
            Err(error) => {
                tracing::warn!("Ignoring unreadable sync preference: {}", error);
                None
            }
        }
    }

    fn remember(&self, resolution: ConflictResolution) {
        let preference = match SyncPreference::try_from(resolution) {
            Ok(preference) => preference,
            Err(error) => {
                tracing::debug!("Not remembering resolution: {}", error);
                return;
            }
        };
        if let Err(error) = self.preferences.remember(preference) {
            tracing::warn!("Failed to remember sync preference: {}", error);
        }
    }

    fn finish(
        &self,
        cycle_id: Uuid,
        outcome: SyncOutcome,
        recovered_from_backup: bool,
    ) -> SyncReport {
        if outcome.is_synced() {
            self.set_phase(SyncPhase::Synced);
        }
        self.set_phase(SyncPhase::Idle);
        SyncReport {
            cycle_id,
            outcome,
            recovered_from_backup,
        }
    }

    fn failed(&self, source: Error) -> SyncError {
        SyncError::Failed {
            step: self.phase(),
            source,
        }
    }

    fn set_phase(&self, next: SyncPhase) {
        let previous = self.phase.send_replace(next);
        debug_assert!(
            previous.can_transition_to(next),
            "illegal sync transition {previous} -> {next}"
        );
        tracing::debug!("Sync phase: {} -> {}", previous, next);
    }
}

#[cfg(test)]
mod tests;
