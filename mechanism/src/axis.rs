use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::positioner::{MoveError, MoveReport, Positioner};

type MoveResult<P> = Result<MoveReport<P>, MoveError<P>>;

/// Runs moves of one mechanism in the background.
///
/// A move is started with [`MechanismAxis::start`] and either awaited with
/// [`MechanismAxis::wait`] or abandoned with [`MechanismAxis::stop`]. The
/// outcome of the last move stays available until the next one starts. A
/// move that ends on its own is picked up by [`MechanismAxis::is_error`] and
/// [`MechanismAxis::error`] without awaiting it first.
pub struct MechanismAxis<P: Positioner + 'static> {
    positioner: Arc<P>,
    move_task: Option<JoinHandle<MoveResult<P::Position>>>,
    cancel: CancellationToken,
    last_result: Option<MoveResult<P::Position>>,
}

impl<P: Positioner + 'static> MechanismAxis<P> {
    pub fn new(positioner: P) -> Self {
        Self {
            positioner: Arc::new(positioner),
            move_task: None,
            cancel: CancellationToken::new(),
            last_result: None,
        }
    }

    pub fn positioner(&self) -> &P {
        &self.positioner
    }

    pub fn is_moving(&self) -> bool {
        self.move_task
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self, target: P::Position) -> Result<(), MoveError<P::Position>> {
        if self.is_moving() {
            return Err(MoveError::AlreadyMoving {
                mechanism: self.positioner.mechanism().to_string(),
            });
        }

        self.cancel = CancellationToken::new();
        self.last_result = None;

        let positioner = self.positioner.clone();
        let cancel = self.cancel.clone();
        info!("Starting background move of {} to {}", positioner.mechanism(), target);

        self.move_task = Some(tokio::spawn(async move {
            positioner.move_to(target, &cancel).await
        }));

        Ok(())
    }

    /// Waits for the running move to finish. Returns the outcome of the last
    /// move, or `None` if no move was ever started.
    pub async fn wait(&mut self) -> Option<&MoveResult<P::Position>> {
        if let Some(handle) = self.move_task.take() {
            let joined = handle.await;
            self.record(joined);
        }

        self.last_result.as_ref()
    }

    /// Cancels the running move and waits for it to wind down.
    pub async fn stop(&mut self) -> Option<&MoveResult<P::Position>> {
        if self.is_moving() {
            info!("Stopping move of {}", self.positioner.mechanism());
        }
        self.cancel.cancel();
        self.wait().await
    }

    /// Whether the last completed move failed.
    pub fn is_error(&mut self) -> bool {
        self.error().is_some()
    }

    pub fn error(&mut self) -> Option<&MoveError<P::Position>> {
        self.collect_finished();
        match &self.last_result {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Takes the outcome of a move task that has already returned.
    fn collect_finished(&mut self) {
        let Some(mut handle) = self
            .move_task
            .take_if(|handle| handle.is_finished())
        else {
            return;
        };

        // A finished task is ready on the first poll unless the runtime's
        // coop budget is spent, in which case the handle is kept for later.
        let mut cx = Context::from_waker(Waker::noop());
        match Pin::new(&mut handle).poll(&mut cx) {
            Poll::Ready(joined) => self.record(joined),
            Poll::Pending => self.move_task = Some(handle),
        }
    }

    fn record(&mut self, joined: Result<MoveResult<P::Position>, JoinError>) {
        let result = joined.unwrap_or_else(|e| {
            Err(MoveError::Aborted {
                mechanism: self.positioner.mechanism().to_string(),
                reason: e.to_string(),
            })
        });
        if let Err(e) = &result {
            warn!("Move of {} failed: {}", self.positioner.mechanism(), e);
        }
        self.last_result = Some(result);
    }
}

impl<P: Positioner + 'static> Drop for MechanismAxis<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
