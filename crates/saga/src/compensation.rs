//! Compensation ledger driving a single saga attempt.

use futures_util::future::BoxFuture;

use crate::error::{MarketError, Result};
use crate::state::SagaState;

type UndoFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Tracks one saga attempt: its state machine plus the ordered ledger of
/// compensating actions for every forward mutation that has completed.
///
/// The ledger only ever contains undos for steps that fully applied, so
/// running it in reverse restores every document the attempt touched.
/// Compensations are best-effort: a failing undo is logged and counted
/// but never retried, and never stops the remaining undos.
pub struct SagaExecution {
    saga: &'static str,
    state: SagaState,
    undos: Vec<(&'static str, UndoFn)>,
}

impl SagaExecution {
    /// Starts a new saga attempt in the validation phase.
    pub fn new(saga: &'static str) -> Self {
        metrics::counter!("saga_executions_total", "saga" => saga).increment(1);
        Self {
            saga,
            state: SagaState::Validating,
            undos: Vec::new(),
        }
    }

    /// Returns the current saga state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Transitions from validation into the mutation phase.
    pub fn begin_mutation(&mut self) {
        debug_assert!(self.state.can_mutate());
        self.state = SagaState::Mutating;
    }

    /// Records the compensation for a forward mutation that just
    /// completed.
    pub fn record_undo<F, Fut>(&mut self, step: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.undos.push((step, Box::new(move || Box::pin(undo()))));
    }

    /// Commits the saga, discarding the undo ledger.
    pub fn commit(mut self) {
        debug_assert!(self.state == SagaState::Mutating);
        self.state = SagaState::Committed;
        self.undos.clear();
        metrics::counter!("saga_committed", "saga" => self.saga).increment(1);
        tracing::info!(saga = self.saga, "saga committed");
    }

    /// Fails the saga attempt, compensating any completed mutations, and
    /// returns the causing error unchanged.
    ///
    /// With an empty ledger this is a plain rejection; otherwise the
    /// recorded undos run in reverse order of completion.
    pub async fn fail(mut self, err: MarketError) -> MarketError {
        if self.undos.is_empty() {
            self.state = SagaState::Rejected;
            metrics::counter!("saga_rejected", "saga" => self.saga).increment(1);
            tracing::info!(saga = self.saga, error = %err, "saga rejected");
            return err;
        }

        self.state = SagaState::RollingBack;
        tracing::warn!(
            saga = self.saga,
            error = %err,
            steps = self.undos.len(),
            "saga failed, compensating completed steps"
        );

        for (step, undo) in self.undos.drain(..).rev() {
            if let Err(undo_err) = undo().await {
                metrics::counter!("saga_compensation_failures_total", "saga" => self.saga)
                    .increment(1);
                tracing::error!(
                    saga = self.saga,
                    step,
                    error = %undo_err,
                    "compensation failed; manual reconciliation required"
                );
            }
        }

        self.state = SagaState::Failed;
        metrics::counter!("saga_failed", "saga" => self.saga).increment(1);
        err
    }

    /// Fails the saga because a mutation step errored: compensates, then
    /// reports the step by name without leaking the raw cause upward.
    pub async fn step_failed(self, step: &'static str, source: MarketError) -> MarketError {
        let err = MarketError::StepFailed {
            step,
            reason: source.to_string(),
        };
        self.fail(err).await
    }
}
