//! Engine lifecycle state machine.
//!
//! The current state lives in a `watch` channel, so background tasks can
//! read it and wait for the engine to leave the running states.

use crate::error::CoreError;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Running,
	Stopping,
	Stopped,
	Failed,
}

impl LifecycleState {
	fn as_str(self) -> &'static str {
		match self {
			Self::Uninitialized => "Uninitialized",
			Self::Initializing => "Initializing",
			Self::Running => "Running",
			Self::Stopping => "Stopping",
			Self::Stopped => "Stopped",
			Self::Failed => "Failed",
		}
	}

	/// True once shutdown has begun or the engine failed.
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Stopping | Self::Stopped | Self::Failed)
	}

	fn can_move_to(self, next: LifecycleState) -> bool {
		use LifecycleState::*;

		matches!(
			(self, next),
			(Uninitialized, Initializing)
				| (Initializing, Running)
				| (Running, Stopping)
				| (Stopping, Stopped)
				| (_, Failed)
		)
	}
}

impl std::fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

pub struct LifecycleManager {
	state: watch::Sender<LifecycleState>,
}

impl LifecycleManager {
	pub fn new() -> Self {
		let (state, _) = watch::channel(LifecycleState::Uninitialized);
		Self { state }
	}

	pub fn state(&self) -> LifecycleState {
		*self.state.borrow()
	}

	/// Moves to `next`, rejecting transitions the state machine does not allow.
	pub fn transition(&self, next: LifecycleState) -> Result<(), CoreError> {
		let mut outcome = Ok(());
		self.state.send_if_modified(|current| {
			if !current.can_move_to(next) {
				outcome = Err(CoreError::Lifecycle(format!(
					"cannot move from {} to {}",
					current, next
				)));
				return false;
			}
			info!("Engine state: {} -> {}", current, next);
			*current = next;
			true
		});
		outcome
	}

	pub fn initialize(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Initializing)
	}

	pub fn start(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Running)
	}

	/// Passes through `Stopping` so watchers observe the shutdown, then stops.
	pub fn shutdown(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Stopping)?;
		self.transition(LifecycleState::Stopped)
	}

	pub fn watch(&self) -> watch::Receiver<LifecycleState> {
		self.state.subscribe()
	}
}

impl Default for LifecycleManager {
	fn default() -> Self {
		Self::new()
	}
}

/// Resolves once the watched engine is shutting down, stopped or failed.
pub async fn wait_for_shutdown(state: &mut watch::Receiver<LifecycleState>) {
	// A dropped manager counts as a shutdown too
	let _ = state.wait_for(|s| s.is_terminal()).await;
}
