//! lux-uploader - concurrent LUX identifier claim upload
//!
//! Reads (entity id, LUX URI) pairs from CSV, filters out work already
//! recorded in the success sink, and pushes `wbcreateclaim` writes through a
//! bounded worker pool under server lag backpressure. Outcomes land in three
//! append-only sinks (success, failure, redirect) so a run can resume where
//! it stopped.

pub mod config;
pub mod error;
pub mod extract;
pub mod input;
pub mod ledger;
pub mod scheduler;
pub mod services;
pub mod types;
pub mod worker;

pub use crate::error::{Result, UploadError};
