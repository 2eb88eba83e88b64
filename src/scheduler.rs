//! Concurrent scheduler
//!
//! Plans the run (resume filter, identifier extraction, optional
//! existing-claim prefetch), fans pending records out across a bounded pool
//! of workers, and consumes results in arrival order. The fan-in loop is the
//! only writer of the outcome sinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::extract::extract_identifier;
use crate::input;
use crate::ledger::{Ledger, ProcessedSet};
use crate::services::lag::{LagCoordinator, LagSettings};
use crate::services::redirect::{RedirectPolicy, RedirectResolver};
use crate::services::wikidata::WikidataClient;
use crate::types::{Outcome, PendingRecord, Record, RunStats};
use crate::worker::{self, RetryPolicy, WorkerContext};

/// Work partition: records to schedule, and outcomes decided without any
/// network activity.
pub struct Plan {
    pub pending: Vec<PendingRecord>,
    pub immediate: Vec<Outcome>,
}

/// Partition input records. Entities already in the success sink are dropped
/// entirely; records whose URI does not extract are failed immediately and
/// never scheduled for network work.
pub fn plan_records(records: Vec<Record>, processed: &ProcessedSet) -> Plan {
    let mut pending = Vec::new();
    let mut immediate = Vec::new();
    let mut resumed = 0usize;

    for record in records {
        if processed.contains(&record.entity_id) {
            resumed += 1;
            continue;
        }
        match extract_identifier(&record.source_uri) {
            Ok(identifier) => pending.push(PendingRecord {
                entity_id: record.entity_id,
                identifier,
            }),
            Err(err) => {
                warn!(entity_id = %record.entity_id, error = %err, "rejecting record before scheduling");
                immediate.push(Outcome::Failure {
                    entity_id: record.entity_id,
                    identifier: "invalid".to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if resumed > 0 {
        info!(resumed, "records already present in success sink");
    }

    Plan { pending, immediate }
}

/// Batched existing-claim lookup. Entities that already carry a value for
/// the property become "already exists" successes; a failed batch fetch
/// fails every entity in the batch, mirroring the rest of the pipeline's
/// outcome-per-record contract.
async fn filter_existing(
    client: &WikidataClient,
    property_id: &str,
    batch_size: usize,
    pending: Vec<PendingRecord>,
) -> (Vec<PendingRecord>, Vec<Outcome>) {
    let mut remaining = Vec::new();
    let mut resolved = Vec::new();

    for batch in pending.chunks(batch_size.max(1)) {
        let ids: Vec<String> = batch.iter().map(|r| r.entity_id.clone()).collect();
        match client.existing_claims(&ids, property_id).await {
            Ok(existing) => {
                for record in batch {
                    let has_claim = existing
                        .get(&record.entity_id)
                        .map(|values| !values.is_empty())
                        .unwrap_or(false);
                    if has_claim {
                        info!(entity_id = %record.entity_id, "claim already present, skipping write");
                        resolved.push(Outcome::Success {
                            entity_id: record.entity_id.clone(),
                            identifier: record.identifier.clone(),
                            note: "already exists".to_string(),
                        });
                    } else {
                        remaining.push(record.clone());
                    }
                }
            }
            Err(err) => {
                warn!(batch_size = batch.len(), error = %err, "existing-claim lookup failed for batch");
                for record in batch {
                    resolved.push(Outcome::Failure {
                        entity_id: record.entity_id.clone(),
                        identifier: record.identifier.clone(),
                        reason: "claim fetch failed".to_string(),
                    });
                }
            }
        }
    }

    (remaining, resolved)
}

/// Run the full upload pipeline to completion.
pub async fn run(config: Config) -> Result<RunStats> {
    let processed = ProcessedSet::load(&config.success_file)?;
    let records = input::read_records(&config.input)?;
    info!(
        total = records.len(),
        resumed = processed.len(),
        "input loaded"
    );

    let mut ledger = Ledger::open(
        &config.success_file,
        &config.failure_file,
        &config.redirect_file,
    )?;
    let mut stats = RunStats::default();

    let plan = plan_records(records, &processed);
    for outcome in &plan.immediate {
        ledger.record(outcome)?;
        stats.tally(outcome);
    }

    let tuning = &config.tuning;
    let client = Arc::new(WikidataClient::new(
        config.api_url.clone(),
        config.credentials.clone(),
        Duration::from_secs(tuning.request_timeout_secs),
    )?);

    // The one fatal failure mode: no token, no run.
    let edit_token = client.fetch_edit_token().await?;
    info!("edit token acquired");

    let mut pending = plan.pending;
    if config.check_existing {
        let (remaining, resolved) = filter_existing(
            &client,
            &config.property_id,
            tuning.claims_batch_size,
            pending,
        )
        .await;
        for outcome in &resolved {
            ledger.record(outcome)?;
            stats.tally(outcome);
        }
        pending = remaining;
    }

    info!(
        pending = pending.len(),
        workers = config.workers,
        "starting upload"
    );

    let coordinator = Arc::new(LagCoordinator::new(LagSettings {
        min_backoff: Duration::from_secs(tuning.min_lag_backoff_secs),
        max_backoff: Duration::from_secs(tuning.max_lag_backoff_secs),
        cooldown: Duration::from_secs(tuning.pause_duration_secs),
    }));
    let resolver = RedirectResolver::new(
        Arc::clone(&client),
        RedirectPolicy {
            max_attempts: tuning.redirect_max_attempts,
            backoff_step: Duration::from_secs(tuning.redirect_backoff_step_secs),
            fail_open: config.redirect_fail_open,
        },
    );
    let ctx = Arc::new(WorkerContext {
        client,
        coordinator,
        resolver,
        edit_token,
        property_id: config.property_id.clone(),
        retry: RetryPolicy {
            max_attempts: tuning.max_attempts,
            pacing_delay: Duration::from_secs(tuning.pacing_delay_secs),
            transport_backoff: Duration::from_secs(tuning.transport_backoff_secs),
            maxlag: tuning.maxlag,
        },
    });

    // Orderly drain on interrupt: records not yet started produce no
    // outcome; in-flight records complete.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, draining in-flight uploads");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("uploading [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap(),
    );

    let mut outcomes = stream::iter(pending.into_iter().map(|record| {
        let ctx = Arc::clone(&ctx);
        let shutdown = Arc::clone(&shutdown);
        async move {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            Some(worker::process_record(&ctx, record).await)
        }
    }))
    .buffer_unordered(config.workers);

    while let Some(item) = outcomes.next().await {
        match item {
            Some(outcome) => {
                ledger.record(&outcome)?;
                stats.tally(&outcome);
                progress.inc(1);
            }
            None => stats.skipped += 1,
        }
    }

    progress.finish_and_clear();
    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        redirected = stats.redirected,
        skipped = stats.skipped,
        "run complete"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entity_id: &str, uri: &str) -> Record {
        Record {
            entity_id: entity_id.to_string(),
            source_uri: uri.to_string(),
        }
    }

    #[test]
    fn plan_splits_pending_and_invalid() {
        let records = vec![
            record("Q1", "https://lux.example.org/data/object/a"),
            record("Q2", "/bad/path"),
            record("Q3", "bare-id"),
        ];
        let plan = plan_records(records, &ProcessedSet::default());

        assert_eq!(
            plan.pending,
            vec![
                PendingRecord {
                    entity_id: "Q1".into(),
                    identifier: "object/a".into(),
                },
                PendingRecord {
                    entity_id: "Q3".into(),
                    identifier: "bare-id".into(),
                },
            ]
        );
        assert_eq!(plan.immediate.len(), 1);
        assert_eq!(plan.immediate[0].entity_id(), "Q2");
    }

    #[test]
    fn plan_drops_already_processed_entities() {
        let dir = tempfile::TempDir::new().unwrap();
        let success = dir.path().join("success.csv");
        std::fs::write(&success, "Q1,object/a,added\n").unwrap();
        let processed = ProcessedSet::load(&success).unwrap();

        let records = vec![
            record("Q1", "https://lux.example.org/data/object/a"),
            record("Q2", "https://lux.example.org/data/object/b"),
        ];
        let plan = plan_records(records, &processed);

        assert_eq!(plan.pending.len(), 1);
        assert_eq!(plan.pending[0].entity_id, "Q2");
        assert!(plan.immediate.is_empty());
    }
}
