use futures::FutureExt;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use super::ScrapeError;
use super::expand::{Children, Expander};
use crate::context::{Context, TerminalRule};
use crate::observability::{RunStats, StatsSnapshot};

/// Slots past the head of the frontier that are scanned for work to start
const LOOKAHEAD: usize = 64;

/// A context whose subtree was abandoned
#[derive(Debug, Clone)]
pub struct ExpansionFailure {
    pub context: Context,
    /// Rendered cache key, when rendering got that far
    pub key: Option<String>,
    pub error: ScrapeError,
}

/// Cache keys of the expansions above a frontier entry
struct Trail {
    key: String,
    parent: Option<Arc<Trail>>,
}

impl Trail {
    fn contains(trail: &Option<Arc<Trail>>, key: &str) -> bool {
        let mut cursor = trail.as_deref();
        while let Some(node) = cursor {
            if node.key == key {
                return true;
            }
            cursor = node.parent.as_deref();
        }
        false
    }

    fn push(trail: &Option<Arc<Trail>>, key: String) -> Option<Arc<Trail>> {
        Some(Arc::new(Trail {
            key,
            parent: trail.clone(),
        }))
    }
}

struct Job {
    context: Context,
    key: String,
    trail: Option<Arc<Trail>>,
}

type Outcome = Result<Children, ScrapeError>;

enum Slot {
    Pending {
        context: Context,
        trail: Option<Arc<Trail>>,
    },
    Running {
        job: Job,
        handle: JoinHandle<Outcome>,
    },
    Settled {
        job: Job,
        outcome: Outcome,
    },
    Failed {
        context: Context,
        key: Option<String>,
        error: ScrapeError,
    },
    Dropped,
}

/// One traversal, pulled one leaf at a time
///
/// The frontier is kept in depth-first pre-order: children replace their
/// parent at the head, in handler order. Up to `workers` expansions run
/// ahead of the consumer in background tasks, but leaves always come out
/// in frontier order, so the output sequence does not depend on timing.
///
/// Nothing is fetched until the first call to [`Run::next_leaf`]. Dropping
/// a run cancels its in-flight expansions; whatever already reached the
/// cache stays there, so starting the same seed again resumes cheaply.
pub struct Run {
    id: Uuid,
    expander: Arc<Expander>,
    rule: TerminalRule,
    workers: usize,
    frontier: VecDeque<Slot>,
    running: usize,
    stats: Arc<RunStats>,
    failures: Vec<ExpansionFailure>,
    span: tracing::Span,
}

impl Run {
    pub(crate) fn new(
        expander: Arc<Expander>,
        rule: TerminalRule,
        workers: usize,
        seed: Vec<Context>,
    ) -> Self {
        let id = Uuid::now_v7();
        let span = tracing::info_span!("scrape", run_id = %id);
        span.in_scope(|| info!(seeds = seed.len(), workers, "Starting scrape run"));

        let frontier = seed
            .into_iter()
            .map(|context| Slot::Pending {
                context,
                trail: None,
            })
            .collect();

        Self {
            id,
            expander,
            rule,
            workers: workers.max(1),
            frontier,
            running: 0,
            stats: Arc::new(RunStats::new()),
            failures: Vec::new(),
            span,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next terminal context, or `None` once the traversal is exhausted
    pub async fn next_leaf(&mut self) -> Option<Context> {
        let span = self.span.clone();
        self.advance().instrument(span).await
    }

    /// Drains the remaining leaves
    pub async fn collect_all(&mut self) -> Vec<Context> {
        let mut leaves = Vec::new();
        while let Some(leaf) = self.next_leaf().await {
            leaves.push(leaf);
        }
        leaves
    }

    pub fn into_stream(self) -> impl Stream<Item = Context> + Send {
        stream::unfold(self, |mut run| async move {
            let leaf = run.next_leaf().await?;
            Some((leaf, run))
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Subtrees abandoned so far, in the order they were reached
    pub fn failures(&self) -> &[ExpansionFailure] {
        &self.failures
    }

    async fn advance(&mut self) -> Option<Context> {
        loop {
            self.schedule();

            let Some(slot) = self.frontier.pop_front() else {
                debug!(
                    emitted = self.stats.snapshot().emitted,
                    failures = self.failures.len(),
                    "Frontier exhausted"
                );
                return None;
            };

            match slot {
                Slot::Pending { context, .. } if context.is_terminal(self.rule) => {
                    self.stats.leaf_emitted();
                    return Some(context);
                }
                Slot::Pending { context, trail } => {
                    // Pool is full; the head waits for the oldest expansion
                    self.frontier.push_front(Slot::Pending { context, trail });
                    self.settle_oldest().await;
                }
                Slot::Running { job, handle } => {
                    self.running -= 1;
                    let outcome = join(handle).await;
                    self.land(job, outcome);
                }
                Slot::Settled { job, outcome } => self.land(job, outcome),
                Slot::Failed {
                    context,
                    key,
                    error,
                } => self.record_failure(context, key, error),
                Slot::Dropped => {}
            }
        }
    }

    /// Starts expansions near the head of the frontier while workers are free
    fn schedule(&mut self) {
        let window = self.frontier.len().min(LOOKAHEAD + self.workers);

        for idx in 0..window {
            let finished = matches!(
                &self.frontier[idx],
                Slot::Running { handle, .. } if handle.is_finished()
            );
            if finished {
                self.reap(idx);
            }
        }

        for idx in 0..window {
            if self.running >= self.workers {
                break;
            }
            let startable = matches!(
                &self.frontier[idx],
                Slot::Pending { context, .. } if !context.is_terminal(self.rule)
            );
            if !startable {
                continue;
            }
            if let Slot::Pending { context, trail } =
                std::mem::replace(&mut self.frontier[idx], Slot::Dropped)
            {
                self.frontier[idx] = self.start(context, trail);
            }
        }
    }

    fn start(&mut self, context: Context, trail: Option<Arc<Trail>>) -> Slot {
        let processor = context.processor().unwrap_or_default().to_string();

        let Ok(handler) = self.expander.registry.resolve(&processor) else {
            return Slot::Failed {
                context,
                key: None,
                error: ScrapeError::HandlerNotFound(processor),
            };
        };

        let key = match handler.cache_key(&context) {
            Ok(key) => key,
            Err(e) => {
                return Slot::Failed {
                    context,
                    key: None,
                    error: e.into(),
                };
            }
        };

        if Trail::contains(&trail, &key) {
            debug!(key = %key, processor = %processor, "Key already expanded on this path, skipping");
            self.stats.cycle_suppressed();
            return Slot::Dropped;
        }

        debug!(key = %key, processor = %processor, "Scheduling expansion");
        let task = self
            .expander
            .clone()
            .expand(handler, key.clone(), context.clone(), self.stats.clone())
            .instrument(self.span.clone());
        let handle = tokio::spawn(task);
        self.running += 1;

        Slot::Running {
            job: Job {
                context,
                key,
                trail,
            },
            handle,
        }
    }

    /// Moves a finished task's outcome into its slot without waiting
    fn reap(&mut self, idx: usize) {
        let Slot::Running { job, mut handle } =
            std::mem::replace(&mut self.frontier[idx], Slot::Dropped)
        else {
            return;
        };

        match (&mut handle).now_or_never() {
            Some(joined) => {
                self.running -= 1;
                self.frontier[idx] = Slot::Settled {
                    job,
                    outcome: joined_outcome(joined),
                };
            }
            None => self.frontier[idx] = Slot::Running { job, handle },
        }
    }

    async fn settle_oldest(&mut self) {
        let Some(idx) = self
            .frontier
            .iter()
            .position(|slot| matches!(slot, Slot::Running { .. }))
        else {
            return;
        };

        if let Slot::Running { job, handle } =
            std::mem::replace(&mut self.frontier[idx], Slot::Dropped)
        {
            self.running -= 1;
            let outcome = join(handle).await;
            self.frontier[idx] = Slot::Settled { job, outcome };
        }
    }

    fn land(&mut self, job: Job, outcome: Outcome) {
        match outcome {
            Ok(children) => {
                debug!(key = %job.key, children = children.len(), "Expansion landed");
                let trail = Trail::push(&job.trail, job.key);
                for child in children.iter().rev() {
                    self.frontier.push_front(Slot::Pending {
                        context: job.context.merge(child),
                        trail: trail.clone(),
                    });
                }
            }
            Err(error) => self.record_failure(job.context, Some(job.key), error),
        }
    }

    fn record_failure(&mut self, context: Context, key: Option<String>, error: ScrapeError) {
        warn!(
            key = key.as_deref().unwrap_or("-"),
            processor = context.processor().unwrap_or("-"),
            error = %error,
            "Expansion failed, abandoning subtree"
        );
        self.stats.expansion_failed();
        self.failures.push(ExpansionFailure {
            context,
            key,
            error,
        });
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        let mut aborted = 0;
        for slot in &self.frontier {
            if let Slot::Running { handle, .. } = slot {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            self.span
                .in_scope(|| debug!(aborted, "Run dropped, cancelled in-flight expansions"));
        }
    }
}

async fn join(handle: JoinHandle<Outcome>) -> Outcome {
    joined_outcome(handle.await)
}

fn joined_outcome(joined: Result<Outcome, tokio::task::JoinError>) -> Outcome {
    joined.unwrap_or_else(|e| Err(ScrapeError::Aborted(e.to_string())))
}
