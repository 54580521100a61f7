// region:    --- Modules
mod pull;
mod push;
mod registry;
// endregion: --- Modules

use std::future::Future;

use crate::Result;

pub use pull::{MetricsServer, PullPublisher};
pub use push::PushPublisher;
pub use registry::{MetricRegistry, EXEC_COUNT_METRIC, EXEC_EVENTS_METRIC, PID_LABEL};

/// How a new observation combines with the published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
	/// Latest observation wins. Right for counters that are already cumulative at the source.
	Set,
	/// Observations add up. Feeding it a cumulative source double counts.
	Increment,
}

/// Publishes one observation for a label.
pub trait MetricPublisher: Send + Sync {
	fn update(&self, label: &str, value: i64) -> impl Future<Output = Result<()>> + Send;

	fn registry(&self) -> &MetricRegistry;
}

/// The publishing strategy picked at startup.
pub enum Publisher {
	Pull(PullPublisher),
	Push(PushPublisher),
}

impl MetricPublisher for Publisher {
	async fn update(&self, label: &str, value: i64) -> Result<()> {
		match self {
			Publisher::Pull(p) => p.update(label, value).await,
			Publisher::Push(p) => p.update(label, value).await,
		}
	}

	fn registry(&self) -> &MetricRegistry {
		match self {
			Publisher::Pull(p) => p.registry(),
			Publisher::Push(p) => p.registry(),
		}
	}
}
