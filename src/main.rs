use std::sync::Arc;

use anyhow::Context;

use marksyncd::bookmarks::NoopBookmarkLoader;
use marksyncd::config::SyncConfig;
use marksyncd::controller::{SyncController, TimedBackgroundExecutor};
use marksyncd::store::SyncStateStore;
use marksyncd::sync::cloud_monitor::{CloudDirMonitor, FolderPlatform};
use marksyncd::sync::local_monitor::LocalDirMonitor;
use marksyncd::sync::monitor::{CloudMonitorControl, MonitorControl, event_channel};
use marksyncd::sync::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    if parse_cli_mode(std::env::args())? == CliMode::Help {
        println!("Usage: marksyncd");
        println!("  Keeps MARKSYNC_LOCAL_DIR and MARKSYNC_CONTAINER_DIR converged.");
        return Ok(());
    }

    let config = SyncConfig::from_env()?;
    tokio::fs::create_dir_all(&config.local_root)
        .await
        .with_context(|| format!("failed to create local root at {:?}", config.local_root))?;
    tokio::fs::create_dir_all(&config.container_root)
        .await
        .with_context(|| {
            format!(
                "failed to create container root at {:?}",
                config.container_root
            )
        })?;

    let (events_tx, events_rx) = event_channel();
    let local = Arc::new(LocalDirMonitor::new(
        config.local_root.clone(),
        config.extension.clone(),
        config.batch_window,
        events_tx.clone(),
    ));
    let cloud = Arc::new(CloudDirMonitor::new(
        config.container_root.clone(),
        config.extension.clone(),
        config.batch_window,
        events_tx,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        config.local_root.clone(),
        config.device_name.clone(),
        Arc::new(FolderPlatform::new(config.container_root.clone())),
        Arc::new(NoopBookmarkLoader),
    ));
    let store = SyncStateStore::new_default()?;
    let controller = Arc::new(SyncController::new(
        local as Arc<dyn MonitorControl>,
        cloud as Arc<dyn CloudMonitorControl>,
        orchestrator,
        store,
        events_rx,
        Arc::new(TimedBackgroundExecutor::default()),
    ));

    eprintln!(
        "[marksyncd] started: local={}, container={}, extension=.{}, device={}",
        config.local_root.display(),
        config.container_root.display(),
        config.extension,
        config.device_name
    );

    if config.sync_enabled {
        controller.start()?;
    } else {
        eprintln!("[marksyncd] sync is disabled (MARKSYNC_ENABLE_SYNC)");
    }

    tokio::signal::ctrl_c().await?;
    eprintln!("[marksyncd] shutting down");
    controller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(vec!["marksyncd".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Run);
    }

    #[test]
    fn parse_cli_mode_supports_help() {
        let mode = parse_cli_mode(vec!["marksyncd".to_string(), "--help".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_arguments() {
        assert!(parse_cli_mode(vec!["marksyncd".to_string(), "--bogus".to_string()]).is_err());
    }
}
