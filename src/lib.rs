//! Resumable, concurrency-bounded media library scanning.
/// Application directory helpers.
pub mod app_dirs;
/// Scan settings persisted as TOML.
pub mod config;
/// Tracing setup.
pub mod logging;
/// Roots, discovery, hashing and scan persistence.
pub mod media_roots;
/// Scan orchestration, worker pool and change classification.
pub mod scanner;
