//! Redirect resolver
//!
//! Checks whether a target entity has been merged into another before any
//! write is attempted. Transport failures are retried with linear backoff;
//! after exhaustion the resolver either fails open (treat as not a redirect
//! and proceed, logged) or fails closed (failure outcome), per configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, UploadError};
use crate::services::wikidata::WikidataClient;

#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub fail_open: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
            fail_open: true,
        }
    }
}

pub struct RedirectResolver {
    client: Arc<WikidataClient>,
    policy: RedirectPolicy,
}

impl RedirectResolver {
    pub fn new(client: Arc<WikidataClient>, policy: RedirectPolicy) -> Self {
        Self { client, policy }
    }

    /// Resolve the redirect target for `entity_id`, if any.
    pub async fn resolve(&self, entity_id: &str) -> Result<Option<String>> {
        for attempt in 1..=self.policy.max_attempts {
            tracing::debug!(entity_id, attempt, "checking redirect status");
            match self.client.entity_redirect(entity_id).await {
                Ok(target) => return Ok(target),
                Err(err) => {
                    tracing::warn!(entity_id, attempt, error = %err, "redirect check failed");
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.backoff_step * attempt).await;
                    }
                }
            }
        }

        if self.policy.fail_open {
            tracing::warn!(
                entity_id,
                "redirect status unknown after retries, proceeding with write"
            );
            Ok(None)
        } else {
            Err(UploadError::Transport(format!(
                "redirect check failed after {} attempts",
                self.policy.max_attempts
            )))
        }
    }
}
