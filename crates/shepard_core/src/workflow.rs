use std::{fmt, future::Future, sync::Arc};

use droplet_api::{DropletApi, ProviderError};
use futures::future::join_all;
use shared::domain::{count_active, Droplet, DropletId};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::ShepardConfig,
    inventory::Inventory,
    poller::{ConvergencePoller, PollError},
    progress::ProgressReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    Create,
    Delete,
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchAction::Create => f.write_str("create"),
            BatchAction::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// At least one call of a batch was rejected. Calls that were accepted
    /// are left in place; `accepted` lists them.
    #[error("failed to {action} {failed} of {requested} droplets: {source}")]
    Batch {
        action: BatchAction,
        requested: usize,
        failed: usize,
        accepted: Vec<DropletId>,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Remote(#[from] ProviderError),
    #[error(transparent)]
    Poll(#[from] PollError<ProviderError>),
    #[error("cancelled while waiting for {step}")]
    Cancelled { step: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub created: Vec<DropletId>,
    pub ticks: usize,
    pub inventory: Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The group had no members; nothing was deleted or polled.
    NothingToDo,
    Destroyed { count: usize, ticks: usize },
}

/// Runs the group workflows against a [`DropletApi`].
pub struct Shepard {
    api: Arc<dyn DropletApi>,
    config: ShepardConfig,
    cancel: CancellationToken,
}

impl Shepard {
    pub fn new(api: Arc<dyn DropletApi>, config: ShepardConfig) -> Self {
        Self {
            api,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn poller(&self) -> ConvergencePoller {
        ConvergencePoller::new(self.config.poll).with_cancellation(self.cancel.clone())
    }

    async fn fetch_group(&self) -> Result<Vec<Droplet>, ProviderError> {
        self.api.list_droplets(&self.config.group_name).await
    }

    /// Awaits a remote step unless the session is cancelled first.
    async fn guarded<T, Fut>(&self, step: &'static str, fut: Fut) -> Result<T, WorkflowError>
    where
        Fut: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(step, "workflow: cancelled");
                Err(WorkflowError::Cancelled { step })
            }
            output = fut => Ok(output),
        }
    }

    /// Creates `count` droplets, waits until that many are active, then
    /// returns the group inventory.
    pub async fn create(
        &self,
        count: usize,
        key_fingerprint: &str,
        progress: &mut dyn ProgressReport,
    ) -> Result<CreateOutcome, WorkflowError> {
        let group = self.config.group_name.as_str();
        info!(group, count, "create: issuing batch");

        let requests: Vec<_> = (0..count)
            .map(|_| self.config.template.request(group, key_fingerprint))
            .collect();
        let results = self
            .guarded(
                "droplet creation",
                join_all(
                    requests
                        .iter()
                        .map(|request| self.api.create_droplet(request)),
                ),
            )
            .await?;
        let created = settle_batch(
            BatchAction::Create,
            results.into_iter().map(|result| result.map(|droplet| droplet.id)),
        )?;

        info!(group, accepted = created.len(), "create: polling for active droplets");
        let label = format!("Creating {count} droplets");
        let polled = self
            .poller()
            .run(
                || self.fetch_group(),
                |droplets: &Vec<Droplet>| {
                    let active = count_active(droplets);
                    if let Err(error) = progress.report(&label, active, count) {
                        warn!(%error, "create: progress render failed");
                    }
                },
                |droplets: &Vec<Droplet>| count_active(droplets) == count,
                |droplets| droplets.len(),
            )
            .await;
        let converged = end_progress(progress, polled)?;
        info!(
            group,
            ticks = converged.ticks,
            members = converged.output,
            "create: converged"
        );

        let inventory = self.inventory().await?;
        Ok(CreateOutcome {
            created,
            ticks: converged.ticks,
            inventory,
        })
    }

    /// Deletes every member of the group and waits until none remain.
    pub async fn destroy(
        &self,
        progress: &mut dyn ProgressReport,
    ) -> Result<DestroyOutcome, WorkflowError> {
        let group = self.config.group_name.as_str();
        let members = self
            .guarded("group membership", self.fetch_group())
            .await??;
        if members.is_empty() {
            info!(group, "destroy: group is empty, nothing to do");
            return Ok(DestroyOutcome::NothingToDo);
        }

        // Frozen here; each tick compares live state against this.
        let original = members.len();
        info!(group, count = original, "destroy: issuing batch");
        let deletions = join_all(members.iter().map(|droplet| async move {
            self.api
                .delete_droplet(droplet.id)
                .await
                .map(|()| droplet.id)
        }));
        let results = self.guarded("droplet deletion", deletions).await?;
        settle_batch(BatchAction::Delete, results)?;

        let label = format!("Destroying {original} droplets");
        let polled = self
            .poller()
            .run(
                || self.fetch_group(),
                |droplets: &Vec<Droplet>| {
                    let gone = original.saturating_sub(droplets.len());
                    if let Err(error) = progress.report(&label, gone, original) {
                        warn!(%error, "destroy: progress render failed");
                    }
                },
                |droplets: &Vec<Droplet>| droplets.is_empty(),
                |_| (),
            )
            .await;
        let converged = end_progress(progress, polled)?;
        info!(group, ticks = converged.ticks, "destroy: converged");

        Ok(DestroyOutcome::Destroyed {
            count: original,
            ticks: converged.ticks,
        })
    }

    pub async fn list(&self) -> Result<Vec<Droplet>, WorkflowError> {
        Ok(self.guarded("group listing", self.fetch_group()).await??)
    }

    pub async fn inventory(&self) -> Result<Inventory, WorkflowError> {
        let members = self
            .guarded("group inventory", self.fetch_group())
            .await??;
        Ok(Inventory::from_droplets(&members))
    }
}

/// Closes the progress line whichever way the session ended, so nothing
/// printed afterwards lands on the partly drawn bar.
fn end_progress<T>(
    progress: &mut dyn ProgressReport,
    polled: Result<T, PollError<ProviderError>>,
) -> Result<T, WorkflowError> {
    let ended = match &polled {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    };
    if let Err(error) = ended {
        warn!(%error, "poll: progress render failed");
    }
    Ok(polled?)
}

/// Splits the results of a joined batch. Fails with the first rejection;
/// accepted calls are logged because nothing rolls them back.
fn settle_batch(
    action: BatchAction,
    results: impl IntoIterator<Item = Result<DropletId, ProviderError>>,
) -> Result<Vec<DropletId>, WorkflowError> {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(id) => accepted.push(id),
            Err(error) => errors.push(error),
        }
    }

    let requested = accepted.len() + errors.len();
    let failed = errors.len();
    let mut errors = errors.into_iter();
    let Some(source) = errors.next() else {
        return Ok(accepted);
    };

    for error in errors {
        warn!(%action, %error, "batch: additional rejection");
    }
    if !accepted.is_empty() {
        warn!(
            %action,
            accepted = ?accepted,
            "batch: accepted calls are not rolled back"
        );
    }
    Err(WorkflowError::Batch {
        action,
        requested,
        failed,
        accepted,
        source,
    })
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
