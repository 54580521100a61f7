use std::{path::Path, sync::Arc, time::Duration};

use tracing::{debug, info};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

use crate::{
	config::{AgentConfig, PublisherConfig, Source},
	consumer::{PinnedRingBuf, RingBufConsumer},
	error::Result,
	event::AgentEvent,
	publisher::{MetricRegistry, MetricsServer, Publisher, PullPublisher, PushPublisher},
	sampler::{MapSampler, PinnedCounterMap, SweepStrategy},
	scheduler::PollingScheduler,
	supervisor::Supervisor,
	trx::new_bounded_channel,
	workers::PublishWorker,
};

/// Stdout by default, a daily rolling file when `log_file` is set. Keep the guard alive.
pub fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	match log_file {
		Some(path) => {
			let dir = path.parent().unwrap_or(Path::new("/var/log"));
			let file = path.file_name().unwrap_or_default();

			let file_appender = rolling::daily(dir, file);
			let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

			tracing_subscriber::fmt()
				.with_writer(non_blocking_writer)
				.with_target(false)
				.with_env_filter(filter)
				.init();

			Some(guard)
		}
		None => {
			tracing_subscriber::fmt().with_target(false).with_env_filter(filter).init();
			None
		}
	}
}

/// Bump the memlock rlimit. This is needed for older kernels that don't use the
/// new memcg based accounting, see https://lwn.net/Articles/837122/
pub fn bump_memlock_rlimit() {
	let rlim = libc::rlimit {
		rlim_cur: libc::RLIM_INFINITY,
		rlim_max: libc::RLIM_INFINITY,
	};
	let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
	if ret != 0 {
		debug!("remove limit on locked memory failed, ret is: {ret}");
	}
}

enum OpenedSource {
	RingBuf(PinnedRingBuf, Duration),
	Map(PinnedCounterMap, SweepStrategy, Duration),
}

/// Opens the configured source, wires the pipeline and runs it until shutdown.
pub async fn run(config: AgentConfig) -> Result<()> {
	let source = match &config.source {
		Source::RingBuf { pin, poll_timeout } => {
			let ring_buf = PinnedRingBuf::open(pin)?;
			info!("attached to ring buffer {}", pin.display());
			OpenedSource::RingBuf(ring_buf, *poll_timeout)
		}
		Source::Map { pin, sweep, interval } => {
			let map = PinnedCounterMap::open(pin)?;
			info!("attached to counter map {}", pin.display());
			OpenedSource::Map(map, *sweep, *interval)
		}
	};

	let mut supervisor = Supervisor::new();
	supervisor.install_signal_handlers();

	let registry = Arc::new(MetricRegistry::new(config.update_mode)?);
	let publisher = match &config.publisher {
		PublisherConfig::Pull { listen } => {
			let server = MetricsServer::bind(*listen, registry.clone()).await?;
			supervisor.spawn("metrics_server", server.run(supervisor.token()));
			Publisher::Pull(PullPublisher::new(registry))
		}
		PublisherConfig::Push { gateway, job } => {
			let publisher = PushPublisher::new(registry, gateway, job)?;
			info!("pushing metrics to {}", publisher.url());
			Publisher::Push(publisher)
		}
	};

	let (tx, rx) = new_bounded_channel::<AgentEvent>("agent_event", config.channel_capacity);

	let publish_worker = PublishWorker::start(rx, Arc::new(publisher), supervisor.token())?;
	supervisor.spawn("publisher", publish_worker.run());

	let scheduler = PollingScheduler::new(supervisor.token());
	match source {
		OpenedSource::RingBuf(ring_buf, poll_timeout) => {
			let consumer = RingBufConsumer::new(ring_buf, tx);
			supervisor.spawn("ringbuf", scheduler.run_events(consumer, poll_timeout));
		}
		OpenedSource::Map(map, sweep, interval) => {
			let sampler = MapSampler::new(map, sweep);
			supervisor.spawn("sampler", scheduler.run_sampling(sampler, tx, interval));
		}
	}

	if let Some(run_time) = config.run_time {
		supervisor.cancel_after(run_time);
	}

	supervisor.wait().await
}
