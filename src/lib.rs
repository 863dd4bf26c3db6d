//! Core of a bidirectional bookmark-directory synchronization engine.
//!
//! Two directory monitors report complete inventories of the local
//! directory and the cloud replica; a pure state machine maps each
//! observation to a list of actions; an I/O orchestrator executes them
//! under coordinated file access. The lifecycle controller owns all three
//! for the duration of a sync session.

pub mod bookmarks;
pub mod config;
pub mod controller;
pub mod error;
pub mod store;
pub mod sync;
