//! Drives a mechanism to a commanded position.
//!
//! A move sends the target once, then polls the mechanism with a status
//! query until it reports the target, the timeout elapses, or the caller
//! cancels. The timeout is measured from the first poll, not from the move
//! command.

pub mod degraded;
pub mod in_out;
pub mod rotation;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sprat_protocol::ProtocolError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

pub use degraded::{DegradedSensorPositioner, GRACE_DELAY, SensorWorkaround};
pub use in_out::MechanismPositioner;
pub use rotation::RotationPositioner;

pub const SLEEP_INTERVAL: Duration = Duration::from_millis(100);
pub const TIMEOUT_INTERVAL: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveParams {
    /// Pause between status polls.
    pub sleep_interval: Duration,
    /// How long polling may continue before the move times out.
    pub timeout_interval: Duration,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            sleep_interval: SLEEP_INTERVAL,
            timeout_interval: TIMEOUT_INTERVAL,
        }
    }
}

/// Summary of a completed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport<P> {
    pub target: P,
    /// Last position the mechanism reported.
    pub observed: P,
    /// Time spent polling.
    pub elapsed: Duration,
    pub polls: u32,
    /// `false` when arrival was assumed after a grace delay instead of being
    /// reported by the position sensor.
    pub sensor_confirmed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MoveError<P: fmt::Debug + fmt::Display> {
    #[error("{mechanism} cannot be commanded to {target}")]
    InvalidTarget { mechanism: String, target: P },

    #[error("{mechanism} is already moving")]
    AlreadyMoving { mechanism: String },

    #[error("Moving {mechanism}: {source}")]
    Command {
        mechanism: String,
        #[source]
        source: ProtocolError,
    },

    #[error(
        "Timed out moving {mechanism} to {target} after {elapsed:?} (command {command:?}): current position is {last}"
    )]
    TimedOut {
        mechanism: String,
        command: String,
        target: P,
        elapsed: Duration,
        last: P,
    },

    #[error("Move of {mechanism} to {target} cancelled after {elapsed:?}, last position {last:?}")]
    Cancelled {
        mechanism: String,
        target: P,
        elapsed: Duration,
        last: Option<P>,
    },

    #[error("Move of {mechanism} ended abnormally: {reason}")]
    Aborted { mechanism: String, reason: String },
}

impl<P: fmt::Debug + fmt::Display> MoveError<P> {
    /// Description text supplied by the device, when the move failed on a
    /// reply that carried one.
    pub fn device_description(&self) -> Option<&str> {
        match self {
            MoveError::Command { source, .. } => source.device_description(),
            _ => None,
        }
    }
}

/// Ephemeral state of one positioning call.
struct MoveSession<P> {
    target: P,
    started: Instant,
    polls: u32,
    last: Option<P>,
}

impl<P: Copy> MoveSession<P> {
    fn new(target: P) -> Self {
        Self {
            target,
            started: Instant::now(),
            polls: 0,
            last: None,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn report(&self, observed: P, sensor_confirmed: bool) -> MoveReport<P> {
        MoveReport {
            target: self.target,
            observed,
            elapsed: self.elapsed(),
            polls: self.polls,
            sensor_confirmed,
        }
    }
}

/// Clears the moving flag when the move ends, however it ends.
struct MovingGuard<'a>(&'a AtomicBool);

impl<'a> MovingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| MovingGuard(flag))
    }
}

impl Drop for MovingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sleeps for `duration`, returning `false` if `cancel` fired first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[async_trait]
pub trait Positioner: Send + Sync {
    type Position: Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn mechanism(&self) -> &str;
    fn params(&self) -> MoveParams;
    fn set_params(&mut self, params: MoveParams);
    fn moving(&self) -> &AtomicBool;

    fn accepts_target(&self, target: Self::Position) -> bool;

    /// Text of the move command for `target` or of the status query.
    fn command_line(&self, target: Option<Self::Position>) -> String;

    /// Sends the move command for `target`, or a status query when `target`
    /// is `None`, and returns the position the mechanism reports.
    async fn command(&self, target: Option<Self::Position>) -> Result<Self::Position, ProtocolError>;

    /// Grace delay after which a move is assumed complete although the
    /// mechanism reported `observed`. Sensors that work never need one.
    fn assumed_arrival(&self, _target: Self::Position, _observed: Self::Position) -> Option<Duration> {
        None
    }

    fn is_moving(&self) -> bool {
        self.moving().load(Ordering::SeqCst)
    }

    async fn move_to(
        &self,
        target: Self::Position,
        cancel: &CancellationToken,
    ) -> Result<MoveReport<Self::Position>, MoveError<Self::Position>> {
        self.move_with(target, self.params(), cancel).await
    }

    async fn move_with(
        &self,
        target: Self::Position,
        params: MoveParams,
        cancel: &CancellationToken,
    ) -> Result<MoveReport<Self::Position>, MoveError<Self::Position>> {
        let mechanism = self.mechanism().to_string();
        let span = info_span!("move", mechanism = %mechanism, target = %target);

        async move {
            if !self.accepts_target(target) {
                return Err(MoveError::InvalidTarget { mechanism, target });
            }
            let Some(_guard) = MovingGuard::acquire(self.moving()) else {
                return Err(MoveError::AlreadyMoving { mechanism });
            };

            let command_error = |source: ProtocolError| MoveError::Command {
                mechanism: mechanism.clone(),
                source,
            };
            let mut session = MoveSession::new(target);
            let cancelled = |session: &MoveSession<Self::Position>| MoveError::Cancelled {
                mechanism: mechanism.clone(),
                target,
                elapsed: session.elapsed(),
                last: session.last,
            };

            if cancel.is_cancelled() {
                return Err(cancelled(&session));
            }

            info!("Sending {:?}", self.command_line(Some(target)));
            let returned = self.command(Some(target)).await.map_err(command_error)?;
            debug!("Move command returned position {}", returned);

            session = MoveSession::new(target);
            loop {
                if cancel.is_cancelled() {
                    return Err(cancelled(&session));
                }

                let observed = self.command(None).await.map_err(command_error)?;
                session.polls += 1;
                session.last = Some(observed);
                debug!(poll = session.polls, "Position is {}", observed);

                if observed == target {
                    info!("Reached {} after {:?}", target, session.elapsed());
                    return Ok(session.report(observed, true));
                }

                if let Some(grace) = self.assumed_arrival(target, observed) {
                    warn!(
                        "Sensor reports {} while moving to {}; assuming arrival after {:?}",
                        observed, target, grace
                    );
                    if !pause(grace, cancel).await {
                        return Err(cancelled(&session));
                    }
                    warn!("Assumed {} reached without sensor confirmation", target);
                    return Ok(session.report(observed, false));
                }

                let elapsed = session.elapsed();
                if elapsed > params.timeout_interval {
                    warn!("Timed out after {:?}, last position {}", elapsed, observed);
                    return Err(MoveError::TimedOut {
                        mechanism: mechanism.clone(),
                        command: self.command_line(Some(target)),
                        target,
                        elapsed,
                        last: observed,
                    });
                }

                if !pause(params.sleep_interval, cancel).await {
                    return Err(cancelled(&session));
                }
            }
        }
        .instrument(span)
        .await
    }
}
