//! copilot-dr - Main entry point for the CLI binary
//!
//! Thin wrapper over `DisasterRecoveryOrchestrator`. Restore outcomes are
//! reported as success/failure; the reasons live in the audit log.

use colored::Colorize;
use copilot_dr_lib::engine::{
    audit::JsonlAuditSink,
    backup::{BackupOptions, IntegrityStatus, RestoreMode},
    cli::{Cli, Commands, OutputFormat},
    config::RecoveryConfig,
    recovery::{DisasterRecoveryOrchestrator, UnifiedDisasterRecoverySystem},
};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run_cli(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_cli(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = cli.resolve_config();
    let json_output = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Backup { source, compression } => {
            cmd_backup(config, BackupOptions { compression, source }, json_output)
        }
        Commands::Restore { path, staged } => {
            let mode = if staged { RestoreMode::Staged } else { RestoreMode::InPlace };
            cmd_restore(config, &path, mode, json_output)
        }
        Commands::Recover => cmd_recover(config, json_output),
        Commands::Verify { path } => cmd_verify(config, &path, json_output),
        Commands::List => cmd_list(config, json_output),
        Commands::Audit { event } => cmd_audit(&config, event.as_deref(), json_output),
    }
}

fn orchestrator(config: RecoveryConfig) -> (DisasterRecoveryOrchestrator, String) {
    let audit_log = config.audit_log.display().to_string();
    let sink = Arc::new(JsonlAuditSink::new(config.audit_log.clone()));
    let system = UnifiedDisasterRecoverySystem::new(config, sink);
    (DisasterRecoveryOrchestrator::new(system), audit_log)
}

fn cmd_backup(config: RecoveryConfig, options: BackupOptions, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let audit_log = config.audit_log.display().to_string();
    let sink = Arc::new(JsonlAuditSink::new(config.audit_log.clone()));
    let system = UnifiedDisasterRecoverySystem::new(config, sink).with_backup_options(options);
    let orchestrator = DisasterRecoveryOrchestrator::new(system);

    let path = orchestrator.run_backup_cycle()?;

    if json {
        println!("{}", serde_json::json!({
            "success": true,
            "artifact": path.display().to_string(),
            "checksum_file": format!("{}.sha256", path.display()),
        }));
    } else {
        println!("{} Backup created: {}", "✓".green(), path.display());
        println!("   Audit log: {}", audit_log);
    }

    Ok(true)
}

fn cmd_restore(config: RecoveryConfig, path: &Path, mode: RestoreMode, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let audit_log = config.audit_log.display().to_string();
    let sink = Arc::new(JsonlAuditSink::new(config.audit_log.clone()));
    let system = UnifiedDisasterRecoverySystem::new(config, sink).with_restore_mode(mode);
    let orchestrator = DisasterRecoveryOrchestrator::new(system);

    let restored = orchestrator.run_recovery_cycle(path);
    print_recovery(restored, &path.display().to_string(), &audit_log, json);
    Ok(restored)
}

fn cmd_recover(config: RecoveryConfig, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let backup_root = config.backup_root.display().to_string();
    let (orchestrator, audit_log) = orchestrator(config);

    let restored = orchestrator.run_latest_recovery_cycle();
    print_recovery(restored, &backup_root, &audit_log, json);
    Ok(restored)
}

fn print_recovery(restored: bool, source: &str, audit_log: &str, json: bool) {
    if json {
        println!("{}", serde_json::json!({
            "success": restored,
            "source": source,
            "audit_log": audit_log,
        }));
    } else if restored {
        println!("{} Restored from {}", "✓".green(), source);
    } else {
        println!("{} Restore from {} failed", "✗".red(), source);
        println!("   See audit log for details: {}", audit_log);
    }
}

fn cmd_verify(config: RecoveryConfig, path: &Path, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let (orchestrator, _) = orchestrator(config);
    let status = orchestrator.verify_backup(path)?;

    if json {
        println!("{}", serde_json::json!({
            "artifact": path.display().to_string(),
            "integrity": status,
        }));
    } else {
        match &status {
            IntegrityStatus::Verified => println!("{} {} matches its checksum", "✓".green(), path.display()),
            IntegrityStatus::MissingChecksum => {
                println!("{} {} has no checksum record", "✗".red(), path.display())
            }
            IntegrityStatus::HashMismatch { expected, actual } => {
                println!("{} {} does not match its checksum", "✗".red(), path.display());
                println!("   Expected: {}", expected);
                println!("   Actual:   {}", actual);
            }
        }
    }

    Ok(status.is_verified())
}

fn cmd_list(config: RecoveryConfig, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let backup_root = config.backup_root.display().to_string();
    let (orchestrator, _) = orchestrator(config);
    let backups = orchestrator.list_backups()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&backups)?);
    } else {
        println!("Backups in {}:", backup_root);
        if backups.is_empty() {
            println!("   (none)");
        }
        for backup in &backups {
            let marker = if backup.checksum.is_some() { "✓".green() } else { "?".yellow() };
            println!("   {} {} ({} bytes)", marker, backup.id, backup.size);
        }
    }

    Ok(true)
}

fn cmd_audit(config: &RecoveryConfig, event: Option<&str>, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let log = JsonlAuditSink::new(config.audit_log.clone());
    let events = match event {
        Some(name) => log.query_by_event(name)?,
        None => log.query_all()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        println!("Audit log: {}", log.path().display());
        if events.is_empty() {
            println!("   (no events)");
        }
        for event in &events {
            let name = if event.is_failure() { event.event.red() } else { event.event.green() };
            let detail = event
                .detail_str("message")
                .or_else(|| event.detail_str("artifact"))
                .or_else(|| event.detail_str("source"))
                .unwrap_or("");
            println!("   {} {} {}", event.timestamp.to_rfc3339(), name, detail);
        }
    }

    Ok(true)
}
