//! Retrying pending images with user supplied credentials.
//!
//! The collector that talks to the user is kept behind [`CredentialCollector`]:
//! each round it receives the current pending list and answers with a batch
//! of `(position, credentials)` pairs or a cancellation.

use crate::auth::Credentials;
use crate::error::{CheckError, Result};
use crate::registry::{decode_tags, decode_token, RegistryClient};
use crate::store::{ClassificationStore, PendingAuthorization};
use colored::*;
use reqwest::StatusCode;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Reply of the credential collector for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialReply {
    Submit(Vec<(usize, Credentials)>),
    Cancel,
}

pub trait CredentialCollector {
    fn collect(&mut self, pending: &[PendingAuthorization]) -> anyhow::Result<CredentialReply>;
}

/// What happened to the entries of one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub resolved: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub struct CredentialAuthenticator<'a> {
    client: &'a RegistryClient,
}

impl<'a> CredentialAuthenticator<'a> {
    pub fn new(client: &'a RegistryClient) -> Self {
        Self { client }
    }

    /// Token exchange with Basic auth, then the bearer tags request.
    pub async fn fetch_tags(
        &self,
        entry: &PendingAuthorization,
        credentials: &Credentials,
    ) -> Result<Vec<String>> {
        let response = self
            .client
            .get_token(&entry.challenge, Some(credentials))
            .await?;
        if !response.status().is_success() {
            return Err(CheckError::AuthenticationFailed(response.status()));
        }
        let token = decode_token(response).await?;

        let response = self.client.get_tag_list(&entry.image, Some(&token)).await?;
        match response.status() {
            StatusCode::OK => decode_tags(response).await,
            status => Err(CheckError::AuthenticationFailed(status)),
        }
    }

    /// Retries every entry of the batch, then removes the resolved ones from
    /// `pending` in one pass.
    pub async fn apply_batch(
        &self,
        store: &mut ClassificationStore,
        batch: &[(usize, Credentials)],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut to_remove = Vec::new();
        let mut seen = HashSet::new();

        for (position, credentials) in batch {
            if !seen.insert(*position) {
                debug!(position, "ignoring repeated selection");
                continue;
            }
            let Some(entry) = store.pending().get(*position).cloned() else {
                warn!(position, "ignoring selection outside the pending list");
                continue;
            };
            let name = entry.image.raw_name.clone();

            if credentials.is_declined() {
                debug!(image = %name, "no username given, skipping");
                outcome.skipped.push(name);
                continue;
            }

            match self.fetch_tags(&entry, credentials).await {
                Ok(tags) => {
                    println!("{} Tags for {} downloaded successfully", "✓".green(), name.cyan());
                    store.add_resolved(entry.image, tags);
                    to_remove.push(*position);
                    outcome.resolved.push(name);
                }
                Err(err) => {
                    warn!(image = %name, error = %err, "authenticated retry failed");
                    println!("{} Failed authentication for {}: {}", "✗".red(), name, err);
                    outcome.failed.push(name);
                }
            }
        }

        store.remove_pending(&to_remove);
        outcome
    }

    /// Asks the collector for credentials until nothing is pending or the
    /// user cancels. A collector failure counts as a cancel. Entries still
    /// pending afterwards are dropped from the report.
    pub async fn run<C: CredentialCollector>(
        &self,
        store: &mut ClassificationStore,
        collector: &mut C,
    ) {
        while !store.pending().is_empty() {
            let reply = match collector.collect(store.pending()) {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(error = %err, "credential collection failed");
                    println!("{} Stopping authorization: {:#}", "✗".red(), err);
                    break;
                }
            };
            let batch = match reply {
                CredentialReply::Cancel => break,
                CredentialReply::Submit(batch) if batch.is_empty() => break,
                CredentialReply::Submit(batch) => batch,
            };

            let outcome = self.apply_batch(store, &batch).await;
            debug!(
                resolved = outcome.resolved.len(),
                skipped = outcome.skipped.len(),
                failed = outcome.failed.len(),
                "finished authorization round"
            );
        }

        if !store.pending().is_empty() {
            debug!(remaining = store.pending().len(), "leaving images unauthorized");
        }
    }
}
