pub mod cloud_monitor;
pub mod conflict;
pub mod coordinated;
pub mod local_monitor;
pub mod metadata;
pub mod monitor;
pub mod naming;
pub mod orchestrator;
pub mod paths;
pub mod reconcile;
