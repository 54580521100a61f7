use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
	consumer::{RecordSource, RingBufConsumer},
	error::Result,
	event::AgentEvent,
	sampler::{CounterMap, MapSampler},
	trx::Tx,
};

/// Drives either the ring buffer consumer or the map sampler until shutdown.
#[derive(Clone)]
pub struct PollingScheduler {
	shutdown: CancellationToken,
	max_cycles: Option<u64>,
}

impl PollingScheduler {
	pub fn new(shutdown: CancellationToken) -> Self {
		PollingScheduler {
			shutdown,
			max_cycles: None,
		}
	}

	/// Stops after `cycles` iterations even without shutdown.
	pub fn with_max_cycles(mut self, cycles: u64) -> Self {
		self.max_cycles = Some(cycles);
		self
	}

	fn keep_going(&self, cycle: u64) -> bool {
		!self.shutdown.is_cancelled() && self.max_cycles.map_or(true, |max| cycle < max)
	}

	/// Event mode: the poll itself blocks up to `poll_timeout`, no extra sleep.
	pub async fn run_events<S: RecordSource>(
		self,
		mut consumer: RingBufConsumer<S>,
		poll_timeout: Duration,
	) -> Result<()> {
		info!("event mode started (poll timeout {poll_timeout:?})");

		let mut cycle = 0;
		while self.keep_going(cycle) {
			cycle += 1;

			let res = tokio::select! {
				_ = self.shutdown.cancelled() => break,
				res = consumer.poll(poll_timeout) => res,
			};

			if let Err(err) = res {
				warn!("ring buffer poll failed: {err}");
				// Fixed pause so a persistent failure does not spin.
				if self.pause(poll_timeout).await {
					break;
				}
			}
		}

		consumer.close();
		info!("event mode stopped after {cycle} cycles");
		Ok(())
	}

	/// Sampling mode: full sweep, forward positive counts, sleep `interval`.
	pub async fn run_sampling<M: CounterMap>(
		self,
		sampler: MapSampler<M>,
		tx: Tx<AgentEvent>,
		interval: Duration,
	) -> Result<()> {
		info!("sampling mode started ({:?}, every {interval:?})", sampler.strategy());

		let mut cycle = 0;
		while self.keep_going(cycle) {
			cycle += 1;

			let sweep = tokio::select! {
				_ = self.shutdown.cancelled() => break,
				sweep = sampler.sweep() => sweep,
			};
			debug!(
				"sweep {cycle}: {} keys with a positive count, {} failed lookups",
				sweep.samples.len(),
				sweep.failed
			);

			for sample in sweep.samples {
				if let Err(err) = tx.send(sample).await {
					warn!("cannot forward sample for key {}: {err}", sample.key);
				}
			}

			if self.pause(interval).await {
				break;
			}
		}

		info!("sampling mode stopped after {cycle} cycles");
		Ok(())
	}

	/// Sleeps unless shutdown comes first. Returns `true` on shutdown.
	async fn pause(&self, duration: Duration) -> bool {
		tokio::select! {
			_ = self.shutdown.cancelled() => true,
			_ = tokio::time::sleep(duration) => false,
		}
	}
}

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::{
		sampler::{CounterSample, SweepStrategy},
		trx::new_bounded_channel,
		Error,
	};
	use std::{
		collections::BTreeMap,
		sync::{
			atomic::{AtomicU64, Ordering},
			Arc,
		},
	};

	struct FailingRing {
		polls: Arc<AtomicU64>,
	}

	impl RecordSource for FailingRing {
		async fn poll_records<F>(&mut self, _timeout: Duration, _on_record: F) -> crate::Result<usize>
		where
			F: FnMut(&[u8]) + Send,
		{
			self.polls.fetch_add(1, Ordering::Relaxed);
			Err(Error::custom("kernel said no"))
		}
	}

	struct FixedMap(BTreeMap<i32, i64>);

	impl CounterMap for FixedMap {
		fn get(&self, key: i32) -> crate::Result<Option<i64>> {
			Ok(self.0.get(&key).copied())
		}

		fn keys(&self) -> crate::Result<Vec<i32>> {
			Ok(self.0.keys().copied().collect())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn event_loop_survives_poll_failures() -> Result<()> {
		// -- Setup & Fixtures
		let polls = Arc::new(AtomicU64::new(0));
		let (tx, _rx) = new_bounded_channel::<AgentEvent>("test", 4);
		let consumer = RingBufConsumer::new(FailingRing { polls: polls.clone() }, tx);
		let scheduler = PollingScheduler::new(CancellationToken::new()).with_max_cycles(3);

		// -- Exec
		scheduler.run_events(consumer, Duration::from_millis(100)).await?;

		// -- Check
		assert_eq!(polls.load(Ordering::Relaxed), 3);

		Ok(())
	}

	#[tokio::test(start_paused = true)]
	async fn sampling_cycles_forward_positive_counts() -> Result<()> {
		// -- Setup & Fixtures
		let map = FixedMap(BTreeMap::from([(1, 0), (2, 7), (3, 1)]));
		let sampler = MapSampler::new(map, SweepStrategy::Range { max_key: 10 });
		let (tx, rx) = new_bounded_channel::<AgentEvent>("test", 16);
		let scheduler = PollingScheduler::new(CancellationToken::new()).with_max_cycles(2);

		// -- Exec
		scheduler.run_sampling(sampler, tx, Duration::from_secs(1)).await?;

		// -- Check
		let samples: Vec<CounterSample> = std::iter::from_fn(|| rx.try_recv())
			.filter_map(|evt| match evt {
				AgentEvent::Sample(s) => Some(s),
				_ => None,
			})
			.collect();
		assert_eq!(samples.len(), 4);
		assert_eq!(samples[0], CounterSample { key: 2, value: 7 });
		assert_eq!(samples[1], CounterSample { key: 3, value: 1 });

		Ok(())
	}

	#[tokio::test]
	async fn cancelled_scheduler_does_not_poll() -> Result<()> {
		// -- Setup & Fixtures
		let polls = Arc::new(AtomicU64::new(0));
		let (tx, _rx) = new_bounded_channel::<AgentEvent>("test", 4);
		let consumer = RingBufConsumer::new(FailingRing { polls: polls.clone() }, tx);
		let token = CancellationToken::new();
		token.cancel();

		// -- Exec
		PollingScheduler::new(token).run_events(consumer, Duration::from_secs(1)).await?;

		// -- Check
		assert_eq!(polls.load(Ordering::Relaxed), 0);

		Ok(())
	}
}
