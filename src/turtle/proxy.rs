//! Coordinator-side model of a connected turtle.
//!
//! A [`Turtle`] tracks where the coordinator believes a worker is and
//! turns movement requests into command strings for that worker. The
//! tracked position only changes after the worker reports success, so a
//! blocked or unfuelled move leaves the model untouched.

use serde::Serialize;

use super::types::{Direction, Location, Movement, Position};
use crate::error::CoordinatorError;
use crate::protocol::{ExecutionResult, WorkerId};

/// Something that can deliver a command to a worker and return its result.
pub trait CommandSink {
    /// Sends `command` to `worker_id` and waits for its single status.
    fn dispatch(
        &self,
        worker_id: &WorkerId,
        command: String,
    ) -> impl Future<Output = Result<ExecutionResult, CoordinatorError>> + Send;
}

/// Turtle-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TurtleError {
    /// The worker ran the operation and reported failure.
    #[error("turtle {worker_id} failed to {operation}")]
    Command {
        /// Worker that failed.
        worker_id: WorkerId,
        /// Operation that was attempted.
        operation: String,
        /// Failure detail as reported (e.g. `"Out of fuel"`).
        detail: Option<serde_json::Value>,
    },

    /// The worker answered with a payload of the wrong shape.
    #[error("unexpected reply to {operation}: {reply}")]
    UnexpectedReply {
        /// Operation that was attempted.
        operation: String,
        /// The payload received.
        reply: String,
    },

    /// The step would leave the representable coordinate range. Nothing
    /// was sent to the worker.
    #[error("turtle {worker_id} cannot move {direction:?} from {location:?}")]
    OutOfRange {
        /// Worker that was asked to move.
        worker_id: WorkerId,
        /// Requested step.
        direction: Direction,
        /// Tracked location at the time.
        location: Location,
    },

    /// The command never reached the worker or never came back.
    #[error(transparent)]
    Dispatch(#[from] CoordinatorError),
}

impl From<TurtleError> for CoordinatorError {
    fn from(err: TurtleError) -> Self {
        match err {
            TurtleError::Command {
                worker_id, detail, ..
            } => Self::CommandFailed { worker_id, detail },
            TurtleError::OutOfRange { worker_id, .. } => Self::CommandFailed {
                worker_id,
                detail: Some(serde_json::Value::from("coordinate out of range")),
            },
            TurtleError::UnexpectedReply { .. } => Self::Internal(err.to_string()),
            TurtleError::Dispatch(inner) => inner,
        }
    }
}

/// A representation of, and handle on, one turtle.
#[derive(Debug, Clone, Serialize)]
pub struct Turtle {
    uid: WorkerId,
    name: String,
    position: Position,
}

impl Turtle {
    /// Creates a turtle at the origin facing north.
    #[must_use]
    pub fn new(uid: WorkerId) -> Self {
        Self {
            uid,
            name: String::new(),
            position: Position::default(),
        }
    }

    /// Returns the turtle's identity.
    #[must_use]
    pub const fn uid(&self) -> &WorkerId {
        &self.uid
    }

    /// Returns the display name (empty if unnamed).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the tracked position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Overrides the tracked position.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Runs `return turtle.<operation>()` on the worker.
    async fn command<S: CommandSink>(
        &self,
        sink: &S,
        operation: &str,
    ) -> Result<ExecutionResult, TurtleError> {
        let result = sink
            .dispatch(&self.uid, format!("return turtle.{operation}()"))
            .await?;
        match result {
            ExecutionResult::Failure(detail) => Err(TurtleError::Command {
                worker_id: self.uid.clone(),
                operation: operation.to_string(),
                detail,
            }),
            ok => Ok(ok),
        }
    }

    /// Moves one block in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`TurtleError::OutOfRange`] if the tracked position cannot
    /// take another step that way, [`TurtleError::Command`] if the worker
    /// refuses the move and [`TurtleError::Dispatch`] if the command
    /// cannot be delivered.
    pub async fn move_step<S: CommandSink>(
        &mut self,
        sink: &S,
        direction: Direction,
    ) -> Result<Position, TurtleError> {
        let Some(next) = self.position.stepped(direction) else {
            return Err(TurtleError::OutOfRange {
                worker_id: self.uid.clone(),
                direction,
                location: self.position.location,
            });
        };
        self.command(sink, direction.api_name()).await?;
        self.position = next;
        tracing::debug!(turtle = %self.uid, ?direction, position = ?self.position, "turtle moved");
        Ok(self.position)
    }

    /// Moves forwards.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn forward<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.move_step(sink, Direction::Forward).await
    }

    /// Moves backwards.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn back<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.move_step(sink, Direction::Back).await
    }

    /// Moves up.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn up<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.move_step(sink, Direction::Up).await
    }

    /// Moves down.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn down<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.move_step(sink, Direction::Down).await
    }

    /// Turns 90° counter-clockwise.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn turn_left<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.command(sink, "turnLeft").await?;
        self.position.bearing = self.position.bearing.turned_left();
        Ok(self.position)
    }

    /// Turns 90° clockwise.
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn turn_right<S: CommandSink>(&mut self, sink: &S) -> Result<Position, TurtleError> {
        self.command(sink, "turnRight").await?;
        self.position.bearing = self.position.bearing.turned_right();
        Ok(self.position)
    }

    /// Performs any [`Movement`].
    ///
    /// # Errors
    ///
    /// See [`Turtle::move_step`].
    pub async fn apply<S: CommandSink>(
        &mut self,
        sink: &S,
        movement: Movement,
    ) -> Result<Position, TurtleError> {
        match (movement, movement.direction()) {
            (_, Some(direction)) => self.move_step(sink, direction).await,
            (Movement::TurnLeft, None) => self.turn_left(sink).await,
            (_, None) => self.turn_right(sink).await,
        }
    }

    /// Asks the worker where it is and adopts the answer.
    ///
    /// # Errors
    ///
    /// Returns [`TurtleError::UnexpectedReply`] if the reply is not an
    /// `{x, y, z}` object, plus the errors of [`Turtle::move_step`].
    pub async fn locate<S: CommandSink>(&mut self, sink: &S) -> Result<Location, TurtleError> {
        let result = sink
            .dispatch(&self.uid, "return gps.locate()".to_string())
            .await?;
        let reply = match result {
            ExecutionResult::SuccessWithData(value) => value,
            ExecutionResult::Success => serde_json::Value::Null,
            ExecutionResult::Failure(detail) => {
                return Err(TurtleError::Command {
                    worker_id: self.uid.clone(),
                    operation: "locate".to_string(),
                    detail,
                });
            }
        };
        let location: Location =
            serde_json::from_value(reply.clone()).map_err(|_| TurtleError::UnexpectedReply {
                operation: "locate".to_string(),
                reply: reply.to_string(),
            })?;
        self.position.location = location;
        Ok(location)
    }
}
