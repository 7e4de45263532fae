use copilot_dr_lib::engine::audit::{events, JsonlAuditSink, MemoryAuditSink};
use copilot_dr_lib::engine::backup::{ChecksumVerifier, RestoreStage};
use copilot_dr_lib::engine::config::RecoveryConfig;
use copilot_dr_lib::engine::recovery::{DisasterRecoveryOrchestrator, UnifiedDisasterRecoverySystem};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn count_files(dir: &Path) -> usize {
    let mut total = 0;
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        total += if path.is_dir() { count_files(&path) } else { 1 };
    }
    total
}

fn system(ws: &Path, bk: &Path) -> (UnifiedDisasterRecoverySystem, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let system = UnifiedDisasterRecoverySystem::new(RecoveryConfig::new(ws, bk), sink.clone());
    (system, sink)
}

fn seeded_workspace(root: &Path) -> PathBuf {
    let ws = root.join("ws");
    fs::create_dir_all(ws.join("db")).unwrap();
    fs::write(ws.join("db/production.db"), "tables").unwrap();
    fs::write(ws.join("config.json"), r#"{"mode": "prod"}"#).unwrap();
    ws
}

#[test]
fn test_scheduled_backup_has_matching_checksum_file() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let bk = root.path().join("bk");
    let (system, _sink) = system(&ws, &bk);

    let artifact = system.schedule_backups()?;
    assert!(artifact.starts_with(&bk));

    let record = fs::read_to_string(format!("{}.sha256", artifact.display()))?;
    let digest = record.trim();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(digest, ChecksumVerifier::compute(&artifact)?);
    assert!(ChecksumVerifier::verify(&artifact, digest)?);
    Ok(())
}

#[test]
fn test_restore_repopulates_emptied_workspace() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let (system, sink) = system(&ws, &root.path().join("bk"));

    let artifact = system.schedule_backups()?;
    fs::remove_dir_all(ws.join("db"))?;
    fs::remove_file(ws.join("config.json"))?;
    assert_eq!(count_files(&ws), 0);

    let summary = system.restore_backup(&artifact).expect("restore should succeed");
    assert_eq!(summary.files_restored, 2);
    assert_eq!(fs::read_to_string(ws.join("db/production.db"))?, "tables");
    assert_eq!(fs::read_to_string(ws.join("config.json"))?, r#"{"mode": "prod"}"#);

    let success = sink.events_named(events::RESTORE_SUCCESS);
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].detail_str("source"), Some(artifact.display().to_string().as_str()));
    Ok(())
}

#[test]
fn test_nested_backup_root_blocks_recovery() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = root.path().join("ws");
    let bk = ws.join("bk");
    fs::create_dir_all(bk.join("production_backup"))?;
    fs::write(bk.join("production_backup/sample.txt"), "data")?;
    let before = count_files(&ws);

    let (system, sink) = system(&ws, &bk);
    let failure = system.perform_recovery().unwrap_err();
    assert_eq!(failure.reason(), "nested_backup_root");
    assert_eq!(failure.terminal_stage(), RestoreStage::Aborted);

    let recorded = sink.events();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].event, events::RESTORE_FAILED);
    assert!(recorded[0]
        .detail_str("message")
        .unwrap_or_default()
        .contains("resides within workspace"));

    assert_eq!(count_files(&ws), before);
    assert!(!ws.join("restored").exists());
    Ok(())
}

#[test]
fn test_nested_backup_root_blocks_scheduling() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let (system, _sink) = system(&ws, &ws.join("backups"));

    let err = system.schedule_backups().unwrap_err();
    assert!(err.is_fatal());
    assert!(!ws.join("backups").exists());
    Ok(())
}

#[test]
fn test_corrupted_checksum_blocks_restore() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let (system, sink) = system(&ws, &root.path().join("bk"));

    let artifact = system.schedule_backups()?;
    fs::write(ChecksumVerifier::checksum_path(&artifact), "bad")?;
    fs::write(ws.join("config.json"), "edited")?;

    let failure = system.restore_backup(&artifact).unwrap_err();
    assert_eq!(failure.reason(), "hash_mismatch");
    assert_eq!(fs::read_to_string(ws.join("config.json"))?, "edited");

    let failed = sink.events_named(events::RESTORE_FAILED);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].detail_str("reason"), Some("hash_mismatch"));
    Ok(())
}

#[test]
fn test_deleted_checksum_blocks_restore() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let (system, sink) = system(&ws, &root.path().join("bk"));

    let artifact = system.schedule_backups()?;
    fs::remove_file(ChecksumVerifier::checksum_path(&artifact))?;

    let failure = system.restore_backup(&artifact).unwrap_err();
    assert_eq!(failure.reason(), "missing_checksum");
    assert_eq!(
        sink.events_named(events::RESTORE_FAILED)[0].detail_str("reason"),
        Some("missing_checksum")
    );
    Ok(())
}

#[test]
fn test_production_backup_recovers_into_restored_dir() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = root.path().join("ws");
    let bk = root.path().join("bk");
    fs::create_dir_all(&ws)?;
    fs::create_dir_all(bk.join("production_backup"))?;
    fs::write(bk.join("production_backup/sample.txt"), "data")?;

    let (system, _sink) = system(&ws, &bk);
    system.perform_recovery().expect("recovery should succeed");

    assert_eq!(fs::read_to_string(ws.join("restored/sample.txt"))?, "data");
    Ok(())
}

#[test]
fn test_restoring_twice_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let bk = root.path().join("bk");
    let (system, _sink) = system(&ws, &bk);

    let artifact = system.schedule_backups()?;
    fs::write(ws.join("config.json"), "drifted")?;

    system.restore_backup(&artifact).expect("first restore");
    let first = fs::read_to_string(ws.join("config.json"))?;
    let files_after_first = count_files(&ws);

    system.restore_backup(&artifact).expect("second restore");
    assert_eq!(fs::read_to_string(ws.join("config.json"))?, first);
    assert_eq!(count_files(&ws), files_after_first);
    assert_eq!(system.list_backups()?.len(), 1);
    Ok(())
}

#[test]
fn test_orchestrator_with_jsonl_audit_log() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let ws = seeded_workspace(root.path());
    let config = RecoveryConfig::new(&ws, root.path().join("bk"))
        .with_audit_log(root.path().join("audit").join("dr.jsonl"));
    let log = JsonlAuditSink::new(config.audit_log.clone());
    let orchestrator = DisasterRecoveryOrchestrator::new(UnifiedDisasterRecoverySystem::new(
        config,
        Arc::new(log.clone()),
    ));

    let artifact = orchestrator.run_backup_cycle()?;
    assert!(orchestrator.run_recovery_cycle(&artifact));
    assert!(!orchestrator.run_recovery_cycle(&root.path().join("bk").join("missing.tar.gz")));

    let recorded = log.query_all()?;
    let names: Vec<_> = recorded.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(
        names,
        vec![events::BACKUP_SCHEDULED, events::RESTORE_SUCCESS, events::RESTORE_FAILED]
    );
    assert!(recorded.iter().all(|e| e.module == "disaster_recovery"));
    Ok(())
}
