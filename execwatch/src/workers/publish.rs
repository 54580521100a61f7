use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
	error::Result,
	event::AgentEvent,
	publisher::MetricPublisher,
	trx::Rx,
};

/// Moves acquired events into the publisher. Ends when the channel closes or on shutdown.
pub struct PublishWorker<P> {
	rx: Rx<AgentEvent>,
	publisher: Arc<P>,
	shutdown: CancellationToken,
}

impl<P: MetricPublisher> PublishWorker<P> {
	pub fn start(rx: Rx<AgentEvent>, publisher: Arc<P>, shutdown: CancellationToken) -> Result<Self> {
		Ok(PublishWorker { rx, publisher, shutdown })
	}

	pub async fn run(self) -> Result<()> {
		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => {
					break;
				}

				evt = self.rx.recv() => {
					match evt {
						Ok(evt) => self.handle(evt).await,
						Err(e) => {
							debug!("Channel '{}' closed: {:?}", self.rx.name(), e);
							break;
						}
					}
				}
			}
		}

		info!("publisher stopped with {} labels", self.publisher.registry().len());
		Ok(())
	}

	async fn handle(&self, evt: AgentEvent) {
		let (label, value) = match evt {
			AgentEvent::Exec(e) => {
				info!(
					target: "exec",
					"PID: {} | UID: {} | CMD: {} | MSG: {}",
					e.pid, e.uid, e.command, e.message
				);
				(e.pid, 1)
			}
			AgentEvent::Sample(s) => (s.key, s.value),
		};

		if let Err(err) = self.publisher.update(&label.to_string(), value).await {
			warn!("failed to publish {label}={value}: {err}");
		}
	}
}
