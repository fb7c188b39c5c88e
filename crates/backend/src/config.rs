// Copyright 2025 Irreducible Inc.
//! Engine configuration.

use duet_utils::env::parse_env_var;

use crate::BackendError;

/// Environment variable sizing the worker pool of the alternate engine.
pub const WORKER_THREADS_ENV: &str = "DUET_WORKER_THREADS";

/// Parameters shared by all engines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
	/// Number of worker threads an engine may own. `None` lets rayon decide.
	pub worker_threads: Option<usize>,
}

impl BackendConfig {
	/// Reads the configuration from the environment.
	pub fn from_env() -> Result<Self, BackendError> {
		let worker_threads = parse_env_var::<usize>(WORKER_THREADS_ENV).map_err(|raw| {
			BackendError::Config(format!("{WORKER_THREADS_ENV}={raw:?} is not a thread count"))
		})?;
		if worker_threads == Some(0) {
			return Err(BackendError::Config(format!("{WORKER_THREADS_ENV} must be positive")));
		}
		Ok(Self { worker_threads })
	}

	/// Sets the worker thread count.
	pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
		self.worker_threads = Some(worker_threads);
		self
	}
}
