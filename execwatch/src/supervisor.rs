use std::{future::Future, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;

/// Owns every agent task and the shutdown token they watch.
pub struct Supervisor {
	shutdown: CancellationToken,
	tasks: JoinSet<(&'static str, Result<()>)>,
}

impl Default for Supervisor {
	fn default() -> Self {
		Self::new()
	}
}

impl Supervisor {
	pub fn new() -> Self {
		Self {
			shutdown: CancellationToken::new(),
			tasks: JoinSet::new(),
		}
	}

	pub fn token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub fn spawn<F>(&mut self, name: &'static str, fut: F)
	where
		F: Future<Output = Result<()>> + Send + 'static,
	{
		self.tasks.spawn(async move { (name, fut.await) });
	}

	/// SIGINT and SIGTERM both cancel the token.
	pub fn install_signal_handlers(&self) {
		tokio::spawn(cancel_on_signal("SIGINT", tokio::signal::ctrl_c(), self.token()));

		#[cfg(unix)]
		{
			use tokio::signal::unix::{signal, SignalKind};

			let t = self.token();
			match signal(SignalKind::terminate()) {
				Ok(mut sigterm) => {
					tokio::spawn(async move {
						if sigterm.recv().await.is_some() {
							info!("SIGTERM received");
							t.cancel();
						}
					});
				}
				Err(err) => warn!("cannot listen for SIGTERM: {err}"),
			}
		}
	}

	/// Timed run: cancels the token once `run_time` has elapsed.
	pub fn cancel_after(&self, run_time: Duration) {
		let t = self.token();
		tokio::spawn(async move {
			tokio::select! {
				_ = t.cancelled() => {}
				_ = tokio::time::sleep(run_time) => {
					info!("run time of {run_time:?} elapsed");
					t.cancel();
				}
			}
		});
	}

	/// Waits until a task ends on its own or the token is cancelled, then shuts everything down.
	pub async fn wait(mut self) -> Result<()> {
		let first = tokio::select! {
			_ = self.shutdown.cancelled() => None,
			res = self.tasks.join_next() => res,
		};

		let mut outcome = Ok(());
		if let Some(res) = first {
			let (name, res) = res?;
			info!("task '{name}' ended, shutting down");
			if let Err(err) = res {
				warn!("task '{name}' failed: {err}");
				outcome = Err(err);
			}
		}

		let res = self.shutdown().await;
		outcome.and(res)
	}

	pub async fn shutdown(mut self) -> Result<()> {
		info!("Supervisor shutdown starting");
		self.shutdown.cancel();

		let mut outcome = Ok(());
		while let Some(res) = self.tasks.join_next().await {
			let (name, res) = res?;
			if let Err(err) = res {
				warn!("task '{name}' failed: {err}");
				if outcome.is_ok() {
					outcome = Err(err);
				}
			}
		}
		info!("Supervisor shutdown complete");

		outcome
	}
}

/// Cancels `token` once `signal` fires. A handler that cannot be installed only warns.
async fn cancel_on_signal<F>(name: &'static str, signal: F, token: CancellationToken)
where
	F: Future<Output = std::io::Result<()>>,
{
	match signal.await {
		Ok(()) => {
			info!("{name} received");
			token.cancel();
		}
		Err(err) => warn!("cannot listen for {name}: {err}"),
	}
}
