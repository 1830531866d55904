//! dljob Core Library
//!
//! Resumable bulk mirroring of a remote directory tree over FTP or
//! remote-copy (`scp`) tunnelled through SSH. A run lists the remote tree
//! into a [`Job`], persists it as a plain-text job file, and drains it with a
//! fixed pool of workers that each hold their own connection. An interrupted
//! run resumes from the job file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`credential`] - Secret bytes that are zeroed on close and on drop
//! - [`connector`] - Protocol sessions, the scheme registry, FTP and remote-copy
//! - [`job`] - Item list, status transitions and the job file format
//! - [`download`] - Path resolution, the shared save routine, retry, worker pool

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connector;
pub mod credential;
pub mod download;
pub mod job;

// Re-export commonly used types
pub use connector::{
    ConnectOptions, Connector, ConnectorError, ConnectorFactory, ConnectorRegistry, ModePolicy,
    build_default_registry,
};
pub use credential::Credential;
pub use download::{
    DEFAULT_WORKERS, DownloadError, PoolError, PoolOptions, PoolStats, RetryPolicy, WorkerPool,
};
pub use job::{ItemStatus, Job, JobError, JobItem};
