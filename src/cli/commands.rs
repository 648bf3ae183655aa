//! CLI command implementations
//!
//! Every command except `init` requires an initialized storage directory.
//! Results are returned as JSON values; `run` prints them.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::archive::{
    DeletionSelector, DirectoryWorkspace, ElementStore, FileClaimStore, FileSystemElementStore,
    Source, StoragePath, Version, VersionAllocator,
};
use crate::config::ArchiveConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::persistence::FileLock;
use crate::transitions::{FileTransitionStore, TransitionQuery, TransitionStore};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let result = run_command(&cli.config, cli.command)?;
    write_response(result)
}

/// Run one command against the configuration at `config_path`
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<Value> {
    let config = ArchiveConfig::load(config_path)?;
    let config_dir = config_path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("path", config_dir.as_str())]);

    if let Command::Init = cmd {
        return init(&config);
    }
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }

    match cmd {
        Command::Init => init(&config),
        Command::Claim { unit } => claim(&config, &unit),
        Command::Put {
            unit,
            version,
            asset,
            source,
            extension,
        } => put(&config, &unit, version, &asset, &source, extension),
        Command::Copy {
            unit,
            asset,
            from_version,
            to_version,
        } => copy(&config, &unit, &asset, from_version, to_version),
        Command::Get {
            unit,
            version,
            asset,
            output,
        } => get(&config, &unit, version, &asset, &output),
        Command::Contains {
            unit,
            version,
            asset,
        } => contains(&config, &unit, version, &asset),
        Command::Delete { unit, version } => delete(&config, &unit, version),
        Command::Usage => usage(&config),
        Command::Transitions { target, pending } => transitions(&config, target, pending),
    }
}

fn is_initialized(config: &ArchiveConfig) -> bool {
    config.state_root().is_dir() && config.archive_root().is_dir()
}

/// Create the archive, workspace and state directories
pub fn init(config: &ArchiveConfig) -> CliResult<Value> {
    if is_initialized(config) {
        return Err(CliError::already_initialized());
    }

    let dirs = [
        config.archive_root(),
        config.workspace_root(),
        config.state_root(),
        config.manifest_dir(),
    ];
    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| {
            CliError::io_error(format!("Failed to create {}: {}", dir.display(), e))
        })?;
    }

    Ok(json!({
        "archive_root": config.archive_root(),
        "workspace": config.workspace_root(),
        "state": config.state_root(),
    }))
}

fn open_store(config: &ArchiveConfig) -> CliResult<FileSystemElementStore> {
    let workspace = Arc::new(DirectoryWorkspace::new(config.workspace_root()));
    Ok(FileSystemElementStore::open(config.archive_root(), workspace)?)
}

fn element_path(config: &ArchiveConfig, unit: &str, version: u64, asset: &str) -> StoragePath {
    StoragePath::new(&config.organization, unit, Version::new(version), asset)
}

/// Claims are loaded, advanced and saved under the claims lock, so
/// concurrent processes never hand out the same version.
fn claim(config: &ArchiveConfig, unit: &str) -> CliResult<Value> {
    let _lock = FileLock::acquire(config.claims_lock_path())?;
    let allocator = VersionAllocator::new(Arc::new(FileClaimStore::open(config.claims_path())?));
    let version = allocator.claim_next(unit)?;

    Ok(json!({ "unit": unit, "version": version }))
}

fn put(
    config: &ArchiveConfig,
    unit: &str,
    version: u64,
    asset: &str,
    source: &str,
    extension: Option<String>,
) -> CliResult<Value> {
    let _lock = FileLock::acquire(config.archive_lock_path())?;
    let store = open_store(config)?;
    let mut path = element_path(config, unit, version, asset);
    if let Some(extension) = extension {
        path = path.with_extension(extension);
    }
    store.put(&path, &Source::new(source))?;

    Ok(json!({ "uri": path.to_uri() }))
}

fn copy(
    config: &ArchiveConfig,
    unit: &str,
    asset: &str,
    from_version: u64,
    to_version: u64,
) -> CliResult<Value> {
    let _lock = FileLock::acquire(config.archive_lock_path())?;
    let store = open_store(config)?;
    let from = element_path(config, unit, from_version, asset);
    let to = element_path(config, unit, to_version, asset);

    if !store.copy(&from, &to)? {
        return Err(CliError::not_found(format!("No element at {}", from.to_uri())));
    }
    Ok(json!({ "uri": to.to_uri() }))
}

fn get(config: &ArchiveConfig, unit: &str, version: u64, asset: &str, output: &Path) -> CliResult<Value> {
    let store = open_store(config)?;
    let path = element_path(config, unit, version, asset);

    let mut stream = store
        .get(&path)?
        .ok_or_else(|| CliError::not_found(format!("No element at {}", path.to_uri())))?;
    let mut file = File::create(output)?;
    let bytes = io::copy(&mut stream, &mut file)?;

    Ok(json!({ "bytes": bytes, "output": output }))
}

fn contains(config: &ArchiveConfig, unit: &str, version: u64, asset: &str) -> CliResult<Value> {
    let store = open_store(config)?;
    let found = store.contains(&element_path(config, unit, version, asset))?;
    Ok(json!({ "contains": found }))
}

fn delete(config: &ArchiveConfig, unit: &str, version: Option<u64>) -> CliResult<Value> {
    let _lock = FileLock::acquire(config.archive_lock_path())?;
    let store = open_store(config)?;
    let selector = match version {
        Some(v) => DeletionSelector::version(&config.organization, unit, Version::new(v)),
        None => DeletionSelector::all(&config.organization, unit),
    };
    let deleted = store.delete(&selector)?;
    Ok(json!({ "deleted": deleted }))
}

fn usage(config: &ArchiveConfig) -> CliResult<Value> {
    let store = open_store(config)?;
    Ok(json!({
        "used_bytes": store.used_space(),
        "usable_bytes": store.usable_space(),
        "total_bytes": store.total_space(),
    }))
}

fn transitions(config: &ArchiveConfig, target: Option<String>, pending: bool) -> CliResult<Value> {
    let store = FileTransitionStore::open(config.transitions_path())?;
    let mut query = TransitionQuery::new();
    if let Some(target) = target {
        query = query.with_target_id(target);
    }
    if pending {
        query = query.with_done(false);
    }
    let found = store.find(&config.organization, &query)?;
    Ok(serde_json::to_value(found)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("arcvault.json");
        ArchiveConfig::new(temp.path().join("storage").display().to_string())
            .save(&config_path)
            .unwrap();
        (temp, config_path)
    }

    #[test]
    fn test_commands_require_init() {
        let (_temp, config_path) = setup();

        let err = run_command(&config_path, Command::Usage).unwrap_err();
        assert_eq!(err.code_str(), "ARCV_CLI_NOT_INITIALIZED");

        run_command(&config_path, Command::Init).unwrap();
        let err = run_command(&config_path, Command::Init).unwrap_err();
        assert_eq!(err.code_str(), "ARCV_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_claim_put_copy_get_delete() {
        let (temp, config_path) = setup();
        run_command(&config_path, Command::Init).unwrap();

        let claimed = run_command(&config_path, Command::Claim { unit: "U1".into() }).unwrap();
        assert_eq!(claimed["version"], 0);
        let claimed = run_command(&config_path, Command::Claim { unit: "U1".into() }).unwrap();
        assert_eq!(claimed["version"], 1);

        let inbox = temp.path().join("storage/workspace/inbox");
        fs::create_dir_all(&inbox).unwrap();
        fs::write(inbox.join("a.mp4"), b"video").unwrap();

        let stored = run_command(
            &config_path,
            Command::Put {
                unit: "U1".into(),
                version: 1,
                asset: "a".into(),
                source: "inbox/a.mp4".into(),
                extension: None,
            },
        )
        .unwrap();
        assert_eq!(stored["uri"], "archive://mh_default_org/U1/1/a");

        run_command(
            &config_path,
            Command::Copy {
                unit: "U1".into(),
                asset: "a".into(),
                from_version: 1,
                to_version: 2,
            },
        )
        .unwrap();

        let output = temp.path().join("out.mp4");
        let fetched = run_command(
            &config_path,
            Command::Get {
                unit: "U1".into(),
                version: 2,
                asset: "a".into(),
                output: output.clone(),
            },
        )
        .unwrap();
        assert_eq!(fetched["bytes"], 5);
        assert_eq!(fs::read(&output).unwrap(), b"video");

        let deleted = run_command(
            &config_path,
            Command::Delete {
                unit: "U1".into(),
                version: None,
            },
        )
        .unwrap();
        assert_eq!(deleted["deleted"], true);

        let found = run_command(
            &config_path,
            Command::Contains {
                unit: "U1".into(),
                version: 1,
                asset: "a".into(),
            },
        )
        .unwrap();
        assert_eq!(found["contains"], false);
    }

    #[test]
    fn test_concurrent_claims_get_distinct_versions() {
        const CLAIMERS: u64 = 8;
        let (_temp, config_path) = setup();
        run_command(&config_path, Command::Init).unwrap();

        // Each claim opens its own claim store, as separate processes do
        let handles: Vec<_> = (0..CLAIMERS)
            .map(|_| {
                let config_path = config_path.clone();
                std::thread::spawn(move || {
                    let claimed =
                        run_command(&config_path, Command::Claim { unit: "U1".into() }).unwrap();
                    claimed["version"].as_u64().unwrap()
                })
            })
            .collect();

        let versions: std::collections::BTreeSet<u64> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(versions, (0..CLAIMERS).collect::<std::collections::BTreeSet<_>>());

        let next = run_command(&config_path, Command::Claim { unit: "U1".into() }).unwrap();
        assert_eq!(next["version"], CLAIMERS);
    }

    #[test]
    fn test_copy_of_missing_element() {
        let (_temp, config_path) = setup();
        run_command(&config_path, Command::Init).unwrap();

        let err = run_command(
            &config_path,
            Command::Copy {
                unit: "U1".into(),
                asset: "a".into(),
                from_version: 0,
                to_version: 1,
            },
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "ARCV_CLI_NOT_FOUND");
    }

    #[test]
    fn test_usage_and_empty_transitions() {
        let (_temp, config_path) = setup();
        run_command(&config_path, Command::Init).unwrap();

        let usage = run_command(&config_path, Command::Usage).unwrap();
        assert_eq!(usage["used_bytes"], 0);

        let listed = run_command(
            &config_path,
            Command::Transitions {
                target: None,
                pending: true,
            },
        )
        .unwrap();
        assert_eq!(listed["episode_transitions"], json!([]));
        assert_eq!(listed["series_transitions"], json!([]));
    }
}
