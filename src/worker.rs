//! Upload worker / retry policy
//!
//! Per-record state machine: pacing delay, redirect check, then the write
//! loop with bounded retries. Every failure is converted to an `Outcome`
//! here; nothing in this module can abort the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::UploadError;
use crate::services::lag::LagCoordinator;
use crate::services::redirect::RedirectResolver;
use crate::services::wikidata::{ClaimResult, WikidataClient};
use crate::types::{Outcome, PendingRecord};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Write attempts per record; lag throttles consume attempts too
    pub max_attempts: u32,
    /// Courtesy delay at the start of every worker invocation
    pub pacing_delay: Duration,
    /// Fixed inter-request delay after a transport failure
    pub transport_backoff: Duration,
    /// Replication-lag ceiling declared on every write
    pub maxlag: u32,
}

/// Shared resources handed to every worker invocation.
pub struct WorkerContext {
    pub client: Arc<WikidataClient>,
    pub coordinator: Arc<LagCoordinator>,
    pub resolver: RedirectResolver,
    pub edit_token: String,
    pub property_id: String,
    pub retry: RetryPolicy,
}

/// Run one record through the full state machine.
pub async fn process_record(ctx: &WorkerContext, record: PendingRecord) -> Outcome {
    tokio::time::sleep(ctx.retry.pacing_delay).await;

    match ctx.resolver.resolve(&record.entity_id).await {
        Ok(Some(target)) => {
            info!(
                entity_id = %record.entity_id,
                target = %target,
                "entity is a redirect, skipping write"
            );
            return Outcome::Redirect {
                entity_id: record.entity_id,
                target,
            };
        }
        Ok(None) => {}
        Err(err) => {
            return Outcome::Failure {
                entity_id: record.entity_id,
                identifier: record.identifier,
                reason: err.to_string(),
            };
        }
    }

    write_claim(ctx, record).await
}

async fn write_claim(ctx: &WorkerContext, record: PendingRecord) -> Outcome {
    for attempt in 1..=ctx.retry.max_attempts {
        ctx.coordinator.observe_and_clear().await;

        let result = ctx
            .client
            .create_claim(
                &record.entity_id,
                &ctx.property_id,
                &record.identifier,
                &ctx.edit_token,
                ctx.retry.maxlag,
            )
            .await;

        match result {
            Ok(ClaimResult::Created { claim_id }) => {
                info!(entity_id = %record.entity_id, claim_id = %claim_id, "claim created");
                return Outcome::Success {
                    entity_id: record.entity_id,
                    identifier: record.identifier,
                    note: "added".to_string(),
                };
            }
            Ok(ClaimResult::LagThrottled { lag_seconds }) => {
                warn!(
                    entity_id = %record.entity_id,
                    attempt,
                    max_attempts = ctx.retry.max_attempts,
                    lag_seconds,
                    "write throttled by server lag"
                );
                ctx.coordinator.signal(lag_seconds).await;
            }
            Ok(ClaimResult::Rejected { reason }) => {
                warn!(entity_id = %record.entity_id, reason = %reason, "write rejected by server");
                return Outcome::Failure {
                    entity_id: record.entity_id,
                    identifier: record.identifier,
                    reason,
                };
            }
            Err(err) => {
                warn!(entity_id = %record.entity_id, attempt, error = %err, "write request failed");
                tokio::time::sleep(ctx.retry.transport_backoff).await;
            }
        }
    }

    warn!(
        entity_id = %record.entity_id,
        attempts = ctx.retry.max_attempts,
        "giving up on record"
    );
    let reason = UploadError::MaxRetriesExceeded(ctx.retry.max_attempts).to_string();
    Outcome::Failure {
        entity_id: record.entity_id,
        identifier: record.identifier,
        reason,
    }
}
