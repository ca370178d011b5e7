use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PollSettings;

#[derive(Debug, Error)]
pub enum PollError<E>
where
    E: std::error::Error + 'static,
{
    #[error("fetching group state failed on tick {tick}: {source}")]
    Fetch {
        tick: usize,
        #[source]
        source: E,
    },
    #[error("group did not converge after {ticks} ticks ({elapsed:?})")]
    TimedOut { ticks: usize, elapsed: Duration },
    #[error("polling cancelled after {ticks} ticks")]
    Cancelled { ticks: usize },
}

/// Result of a converged session: how many ticks it took and what the
/// completion continuation returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged<R> {
    pub ticks: usize,
    pub output: R,
}

/// Re-fetches remote state on a fixed interval until a predicate holds.
///
/// Each tick is fetch, report, check. Ticks never overlap, and nothing is
/// fetched after the tick that converged. A failed fetch ends the session.
#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    settings: PollSettings,
    cancel: CancellationToken,
}

impl ConvergencePoller {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run<S, E, F, Fut, T, P, C, R>(
        &self,
        mut fetch: F,
        mut on_tick: T,
        mut is_converged: P,
        on_converged: C,
    ) -> Result<Converged<R>, PollError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        T: FnMut(&S),
        P: FnMut(&S) -> bool,
        C: FnOnce(S) -> R,
    {
        let started = Instant::now();
        let mut ticks = 0;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled { ticks }),
                fetched = fetch() => fetched,
            };
            ticks += 1;
            let state = fetched.map_err(|source| PollError::Fetch {
                tick: ticks,
                source,
            })?;

            on_tick(&state);
            if is_converged(&state) {
                debug!(ticks, "poll: converged");
                return Ok(Converged {
                    ticks,
                    output: on_converged(state),
                });
            }

            if let Some(limit) = self.settings.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    warn!(ticks, ?elapsed, "poll: gave up waiting for convergence");
                    return Err(PollError::TimedOut { ticks, elapsed });
                }
            }

            debug!(ticks, interval = ?self.settings.interval, "poll: not converged yet");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled { ticks }),
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
