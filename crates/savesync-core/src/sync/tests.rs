use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use super::*;
use crate::models::{ConflictResolution, ResolutionChoice, SyncPreference};
use crate::storage::{FileSaveStore, MemoryCloudStore, MemoryPreferenceStore};

type Journal = Arc<Mutex<Vec<&'static str>>>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn metadata(level: u32, hours_after_t0: i64) -> SaveMetadata {
    SaveMetadata {
        player_level: level,
        last_saved: t0() + chrono::Duration::hours(hours_after_t0),
        meta_currency: u64::from(level) * 100,
        perma_currency: u64::from(level),
        total_play_time: Duration::from_secs(u64::from(level) * 600),
    }
}

fn blob(level: u32, hours_after_t0: i64) -> SaveBlob {
    SaveBlob::new(
        format!("{{\"level\":{level}}}").into_bytes(),
        metadata(level, hours_after_t0),
    )
}

fn local_store(dir: &TempDir) -> FileSaveStore {
    FileSaveStore::open(dir.path(), 3).unwrap()
}

fn local_level(store: &impl LocalSaveStore) -> Option<u32> {
    store
        .read_local()
        .unwrap()
        .map(|save| save.metadata().player_level)
}

fn fixed(resolution: ConflictResolution) -> FixedPrompt {
    FixedPrompt::new(Some(ResolutionChoice::once(resolution)))
}

fn orchestrator<U: ConflictPrompt>(
    local: FileSaveStore,
    cloud: MemoryCloudStore,
    prompt: U,
) -> SyncOrchestrator<FileSaveStore, MemoryCloudStore, MemoryPreferenceStore, U> {
    SyncOrchestrator::new(local, cloud, MemoryPreferenceStore::default(), prompt)
}

/// Never answers; the conflict wait only ends by timeout or cancellation.
struct SilentPrompt;

impl ConflictPrompt for SilentPrompt {
    async fn choose(&self, _conflict: &SaveConflict) -> Option<ResolutionChoice> {
        std::future::pending().await
    }
}

/// Local store that records writes in a shared journal.
struct JournaledLocal {
    inner: FileSaveStore,
    journal: Journal,
    fail_writes: bool,
}

impl LocalSaveStore for JournaledLocal {
    fn read_local(&self) -> crate::Result<Option<SaveBlob>> {
        self.inner.read_local()
    }

    fn write_local(&self, blob: &SaveBlob) -> crate::Result<()> {
        if self.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )));
        }
        self.journal.lock().unwrap().push("local-write");
        self.inner.write_local(blob)
    }

    fn recover_last_good(&self) -> crate::Result<Option<SaveBlob>> {
        self.journal.lock().unwrap().push("local-recover");
        self.inner.recover_last_good()
    }
}

/// Cloud store with scripted upload failures and download substitution.
struct ScriptedCloud {
    inner: MemoryCloudStore,
    journal: Journal,
    upload_failure: Option<CloudError>,
    download_override: Option<SaveBlob>,
}

impl ScriptedCloud {
    fn new(inner: MemoryCloudStore, journal: Journal) -> Self {
        Self {
            inner,
            journal,
            upload_failure: None,
            download_override: None,
        }
    }
}

impl CloudStore for ScriptedCloud {
    async fn fetch_metadata(&self) -> CloudResult<SaveMetadata> {
        self.inner.fetch_metadata().await
    }

    async fn download(&self) -> CloudResult<SaveBlob> {
        match &self.download_override {
            Some(blob) => Ok(blob.clone()),
            None => self.inner.download().await,
        }
    }

    async fn upload(&self, blob: &SaveBlob) -> CloudResult<()> {
        self.journal.lock().unwrap().push("cloud-upload");
        match &self.upload_failure {
            Some(error) => Err(error.clone()),
            None => self.inner.upload(blob).await,
        }
    }

    async fn delete(&self) -> CloudResult<()> {
        self.inner.delete().await
    }
}

#[tokio::test]
async fn scenario_a_keep_newer_keeps_newer_local() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(15, 2)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(12, 0));

    let sync = orchestrator(local, cloud, fixed(ConflictResolution::KeepNewer));
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::Resolved {
            winner: SaveOrigin::Local,
            source: ResolutionSource::Prompt,
            cloud_pending: false,
        }
    );
    assert_eq!(local_level(sync.local()), Some(15));
    assert_eq!(sync.cloud().stored().unwrap().metadata(), &metadata(15, 2));
    assert_eq!(sync.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn scenario_b_pulls_when_only_cloud_has_a_save() {
    let dir = tempdir().unwrap();
    let cloud = MemoryCloudStore::with_save(blob(8, 0));

    let sync = orchestrator(local_store(&dir), cloud, SilentPrompt);
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(report.outcome, SyncOutcome::Pulled);
    assert_eq!(local_level(sync.local()), Some(8));
    assert_eq!(sync.cloud().upload_count(), 0);
}

#[tokio::test]
async fn pushes_when_only_local_has_a_save() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(4, 0)).unwrap();

    let sync = orchestrator(local, MemoryCloudStore::new(), SilentPrompt);
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(report.outcome, SyncOutcome::Pushed);
    assert_eq!(sync.cloud().stored().unwrap().metadata(), &metadata(4, 0));
}

#[tokio::test]
async fn no_saves_anywhere_is_trivially_synced() {
    let dir = tempdir().unwrap();
    let sync = orchestrator(local_store(&dir), MemoryCloudStore::new(), SilentPrompt);

    let report = sync.sync(&SyncRequest::default()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::NoSaves);
    assert_eq!(local_level(sync.local()), None);
}

#[tokio::test]
async fn scenario_c_cancel_leaves_both_stores_and_conflict_returns() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(5, 1)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(6, 0));

    let sync = orchestrator(local, cloud, fixed(ConflictResolution::Cancel));
    let first = sync.sync(&SyncRequest::default()).await.unwrap();
    let second = sync.sync(&SyncRequest::default()).await.unwrap();

    let expected = SyncOutcome::Deferred {
        conflict: SaveConflict {
            local: metadata(5, 1),
            cloud: metadata(6, 0),
        },
    };
    assert_eq!(first.outcome, expected);
    assert_eq!(second.outcome, expected);
    assert_eq!(local_level(sync.local()), Some(5));
    assert_eq!(sync.cloud().stored().unwrap().metadata(), &metadata(6, 0));
    assert_eq!(sync.cloud().upload_count(), 0);
    assert!(sync.local().backups().entries().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_d_recovers_from_second_newest_backup() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    for level in 1..=4 {
        local.write_local(&blob(level, i64::from(level))).unwrap();
    }
    // backups: 3, 2, 1; corrupt the primary and the newest backup
    let newest_backup = local.backups().entries().unwrap()[0].clone();
    fs::write(&newest_backup.path, b"{").unwrap();
    fs::write(local.save_path(), b"\xff\xfe").unwrap();

    let cloud = MemoryCloudStore::with_save(blob(2, 2));
    let sync = orchestrator(local, cloud, SilentPrompt);
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert!(report.recovered_from_backup);
    assert_eq!(report.outcome, SyncOutcome::InSync);
    assert_eq!(local_level(sync.local()), Some(2));
}

#[tokio::test]
async fn identical_metadata_is_a_no_op() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(7, 3)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(7, 3));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(report.outcome, SyncOutcome::InSync);
    assert!(!report.recovered_from_backup);
    assert_eq!(sync.cloud().upload_count(), 0);
    assert!(sync.local().backups().entries().unwrap().is_empty());
    assert_eq!(sync.local().read_local().unwrap().unwrap().metadata(), &metadata(7, 3));
}

#[tokio::test]
async fn keep_cloud_overwrites_local_and_backs_it_up() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(20, 5)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(11, 0));

    let sync = orchestrator(local, cloud, fixed(ConflictResolution::KeepCloud));
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::Resolved {
            winner: SaveOrigin::Cloud,
            source: ResolutionSource::Prompt,
            cloud_pending: false,
        }
    );
    assert_eq!(local_level(sync.local()), Some(11));
    assert_eq!(sync.cloud().upload_count(), 0);

    let backups = sync.local().backups();
    let entries = backups.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(backups.load(&entries[0]).unwrap().metadata(), &metadata(20, 5));
}

#[tokio::test]
async fn keep_newer_tie_keeps_local() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(3, 1)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(9, 1));

    let sync = orchestrator(local, cloud, fixed(ConflictResolution::KeepNewer));
    sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(local_level(sync.local()), Some(3));
    assert_eq!(sync.cloud().stored().unwrap().metadata().player_level, 3);
}

#[tokio::test]
async fn remembered_preference_resolves_without_prompting() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 0)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(5, 4));

    let sync = SyncOrchestrator::new(
        local,
        cloud,
        MemoryPreferenceStore::new(Some(SyncPreference::KeepCloud)),
        SilentPrompt,
    );
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::Resolved {
            winner: SaveOrigin::Cloud,
            source: ResolutionSource::Preference,
            cloud_pending: false,
        }
    );
    assert_eq!(local_level(sync.local()), Some(5));
}

#[tokio::test]
async fn remembered_choice_is_persisted_but_cancel_never_is() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 3)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(1, 0));

    let cancelling = orchestrator(
        local,
        cloud,
        FixedPrompt::new(Some(ResolutionChoice::remembered(
            ConflictResolution::Cancel,
        ))),
    );
    let report = cancelling.sync(&SyncRequest::default()).await.unwrap();
    assert!(matches!(report.outcome, SyncOutcome::Deferred { .. }));
    assert_eq!(cancelling.preferences().load().unwrap(), None);

    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 3)).unwrap();
    let remembering = orchestrator(
        local,
        MemoryCloudStore::with_save(blob(1, 0)),
        FixedPrompt::new(Some(ResolutionChoice::remembered(
            ConflictResolution::KeepNewer,
        ))),
    );
    remembering.sync(&SyncRequest::default()).await.unwrap();
    assert_eq!(
        remembering.preferences().load().unwrap(),
        Some(SyncPreference::KeepNewer)
    );
}

#[tokio::test]
async fn resolution_timeout_is_an_outcome_not_an_error() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 1)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(3, 0));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let request =
        SyncRequest::default().with_resolution_timeout(Some(Duration::from_millis(30)));
    let report = sync.sync(&request).await.unwrap();

    assert!(matches!(
        report.outcome,
        SyncOutcome::ResolutionTimedOut { .. }
    ));
    assert_eq!(local_level(sync.local()), Some(2));
    assert_eq!(sync.cloud().stored().unwrap().metadata().player_level, 3);
    assert_eq!(sync.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn dropped_cycle_returns_phase_to_idle_and_next_sync_runs() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 1)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(3, 0));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let mut phases = sync.subscribe();
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), sync.sync(&SyncRequest::default())).await;

    assert!(abandoned.is_err());
    assert_eq!(sync.phase(), SyncPhase::Idle);
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);

    let request =
        SyncRequest::default().with_resolution_timeout(Some(Duration::from_millis(30)));
    let report = sync.sync(&request).await.unwrap();

    assert!(matches!(
        report.outcome,
        SyncOutcome::ResolutionTimedOut { .. }
    ));
    assert_eq!(local_level(sync.local()), Some(2));
    assert_eq!(sync.cloud().stored().unwrap().metadata().player_level, 3);
    assert_eq!(sync.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn cancelling_while_awaiting_resolution_defers() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(2, 1)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(3, 0));

    let (prompt, mut requests) = ChannelPrompt::new(1);
    let sync = orchestrator(local, cloud, prompt);
    let (handle, signal) = cancel_pair();
    let request = SyncRequest::default().with_cancel(signal);

    let ui = async {
        let pending = requests.recv().await.unwrap();
        assert_eq!(sync.phase(), SyncPhase::AwaitingResolution);
        handle.cancel();
        pending
    };
    let (result, _pending) = tokio::join!(sync.sync(&request), ui);

    assert!(matches!(
        result.unwrap().outcome,
        SyncOutcome::Deferred { .. }
    ));
    assert_eq!(local_level(sync.local()), Some(2));
}

#[tokio::test]
async fn concurrent_sync_is_rejected_not_interleaved() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(9, 2)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(4, 0));

    let (prompt, mut requests) = ChannelPrompt::new(1);
    let sync = orchestrator(local, cloud, prompt);
    let request = SyncRequest::default();

    let second = async {
        let pending = requests.recv().await.unwrap();
        let rejected = sync.sync(&SyncRequest::default()).await;
        assert!(matches!(rejected, Err(SyncError::SyncAlreadyInProgress)));
        assert_eq!(sync.phase(), SyncPhase::AwaitingResolution);
        assert!(pending.respond(ResolutionChoice::once(ConflictResolution::KeepLocal)));
    };
    let (first, ()) = tokio::join!(sync.sync(&request), second);

    assert!(matches!(
        first.unwrap().outcome,
        SyncOutcome::Resolved {
            winner: SaveOrigin::Local,
            ..
        }
    ));
    assert_eq!(sync.cloud().stored().unwrap().metadata().player_level, 9);
}

#[tokio::test]
async fn unavailable_cloud_degrades_to_local_only() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(6, 0)).unwrap();
    let cloud = MemoryCloudStore::new();
    cloud.set_unavailable(Some("auth expired"));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::LocalOnly {
            reason: "Cloud unavailable: auth expired".to_string()
        }
    );
    assert_eq!(local_level(sync.local()), Some(6));
    assert_eq!(sync.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn slow_cloud_times_out_to_local_only() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(6, 0)).unwrap();
    let cloud = MemoryCloudStore::with_save(blob(1, 0)).with_latency(Duration::from_secs(5));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let request = SyncRequest::default().with_cloud_timeout(Some(Duration::from_millis(20)));
    let report = sync.sync(&request).await.unwrap();

    match report.outcome {
        SyncOutcome::LocalOnly { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_local_without_backups_fails_with_local_read() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    fs::write(local.save_path(), b"corrupt").unwrap();
    let cloud = MemoryCloudStore::with_save(blob(3, 0));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let error = sync.sync(&SyncRequest::default()).await.unwrap_err();

    assert!(matches!(error, SyncError::LocalRead(_)));
    assert_eq!(sync.phase(), SyncPhase::Failed);
    assert!(sync.cloud().stored().is_some());

    // the caller may retry once the save is repaired
    sync.local().write_local(&blob(3, 0)).unwrap();
    let report = sync.sync(&SyncRequest::default()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::InSync);
}

#[tokio::test]
async fn local_write_precedes_cloud_write_and_survives_cloud_failure() {
    let dir = tempdir().unwrap();
    let inner = local_store(&dir);
    inner.write_local(&blob(1, 0)).unwrap();
    inner.write_local(&blob(2, 1)).unwrap();
    fs::write(inner.save_path(), b"torn").unwrap();

    let journal = Journal::default();
    let local = JournaledLocal {
        inner,
        journal: journal.clone(),
        fail_writes: false,
    };
    let mut cloud = ScriptedCloud::new(MemoryCloudStore::new(), journal.clone());
    cloud.upload_failure = Some(CloudError::QuotaExceeded {
        required: 64,
        limit: 8,
    });

    let sync = SyncOrchestrator::new(local, cloud, MemoryPreferenceStore::default(), SilentPrompt);
    let error = sync.sync(&SyncRequest::default()).await.unwrap_err();

    assert!(matches!(
        error,
        SyncError::QuotaExceeded {
            required: 64,
            limit: 8
        }
    ));
    assert_eq!(*journal.lock().unwrap(), vec!["local-recover", "cloud-upload"]);
    assert_eq!(local_level(sync.local()), Some(1));
    assert_eq!(sync.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn cloud_outage_while_applying_keeps_local_winner() {
    let dir = tempdir().unwrap();
    let inner = local_store(&dir);
    inner.write_local(&blob(10, 4)).unwrap();

    let journal = Journal::default();
    let mut cloud = ScriptedCloud::new(MemoryCloudStore::with_save(blob(7, 0)), journal.clone());
    cloud.upload_failure = Some(CloudError::Unavailable("connection reset".to_string()));
    let local = JournaledLocal {
        inner,
        journal: journal.clone(),
        fail_writes: false,
    };

    let sync = SyncOrchestrator::new(
        local,
        cloud,
        MemoryPreferenceStore::default(),
        fixed(ConflictResolution::KeepLocal),
    );
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::Resolved {
            winner: SaveOrigin::Local,
            source: ResolutionSource::Prompt,
            cloud_pending: true,
        }
    );
    assert_eq!(local_level(sync.local()), Some(10));
    assert_eq!(*journal.lock().unwrap(), vec!["cloud-upload"]);
}

#[tokio::test]
async fn cloud_changing_mid_cycle_is_not_applied() {
    let dir = tempdir().unwrap();
    let inner = local_store(&dir);
    inner.write_local(&blob(10, 4)).unwrap();

    let journal = Journal::default();
    let mut cloud = ScriptedCloud::new(MemoryCloudStore::with_save(blob(7, 0)), journal.clone());
    cloud.download_override = Some(blob(30, 9));
    let local = JournaledLocal {
        inner,
        journal: journal.clone(),
        fail_writes: false,
    };

    let sync = SyncOrchestrator::new(
        local,
        cloud,
        MemoryPreferenceStore::default(),
        fixed(ConflictResolution::KeepCloud),
    );
    let report = sync.sync(&SyncRequest::default()).await.unwrap();

    assert_eq!(
        report.outcome,
        SyncOutcome::LocalOnly {
            reason: "cloud save changed during sync".to_string()
        }
    );
    assert_eq!(local_level(sync.local()), Some(10));
    assert!(journal.lock().unwrap().is_empty());
}

#[tokio::test]
async fn local_write_failure_is_tagged_with_its_step() {
    let dir = tempdir().unwrap();
    let inner = local_store(&dir);
    inner.write_local(&blob(10, 4)).unwrap();

    let journal = Journal::default();
    let local = JournaledLocal {
        inner,
        journal: journal.clone(),
        fail_writes: true,
    };
    let cloud = ScriptedCloud::new(MemoryCloudStore::with_save(blob(7, 0)), journal);

    let sync = SyncOrchestrator::new(
        local,
        cloud,
        MemoryPreferenceStore::default(),
        fixed(ConflictResolution::KeepCloud),
    );
    let error = sync.sync(&SyncRequest::default()).await.unwrap_err();

    assert!(matches!(
        error,
        SyncError::Failed {
            step: SyncPhase::Applying,
            ..
        }
    ));
    assert_eq!(sync.phase(), SyncPhase::Failed);
}

#[tokio::test]
async fn quota_on_push_is_surfaced() {
    let dir = tempdir().unwrap();
    let local = local_store(&dir);
    local.write_local(&blob(4, 0)).unwrap();
    let cloud = MemoryCloudStore::new();
    cloud.set_quota(Some(1));

    let sync = orchestrator(local, cloud, SilentPrompt);
    let error = sync.sync(&SyncRequest::default()).await.unwrap_err();

    assert!(matches!(error, SyncError::QuotaExceeded { limit: 1, .. }));
    assert_eq!(local_level(sync.local()), Some(4));
}

#[tokio::test]
async fn subscribers_see_final_phase() {
    let dir = tempdir().unwrap();
    let sync = orchestrator(local_store(&dir), MemoryCloudStore::new(), SilentPrompt);
    let mut phases = sync.subscribe();

    sync.sync(&SyncRequest::default()).await.unwrap();

    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);
}
