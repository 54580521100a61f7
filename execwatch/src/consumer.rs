use std::{future::Future, path::Path, time::Duration};

use aya::maps::{Map, MapData, MapError, RingBuf};
use tokio::io::unix::AsyncFd;
use tracing::{debug, info, warn};

use crate::{
	decoder::decode,
	error::{Error, Result},
	event::AgentEvent,
	trx::Tx,
};

/// A kernel-fed buffer of variable-size records.
pub trait RecordSource: Send {
	/// Waits up to `timeout` for data, then drains every available record in production order.
	/// Returns the number of records handed to `on_record`, `0` on timeout.
	fn poll_records<F>(&mut self, timeout: Duration, on_record: F) -> impl Future<Output = Result<usize>> + Send
	where
		F: FnMut(&[u8]) + Send;
}

pub struct PinnedRingBuf {
	fd: AsyncFd<RingBuf<MapData>>,
}

impl PinnedRingBuf {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let open_err = |cause: String| Error::PinnedRingBufOpen {
			path: path.display().to_string(),
			cause,
		};

		let map_data = MapData::from_pin(path).map_err(|err: MapError| open_err(err.to_string()))?;
		let ring_buf = RingBuf::try_from(Map::RingBuf(map_data)).map_err(|err| open_err(err.to_string()))?;
		let fd = AsyncFd::new(ring_buf).map_err(|err| open_err(err.to_string()))?;

		Ok(PinnedRingBuf { fd })
	}
}

impl RecordSource for PinnedRingBuf {
	async fn poll_records<F>(&mut self, timeout: Duration, mut on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) + Send,
	{
		let mut guard = match tokio::time::timeout(timeout, self.fd.readable_mut()).await {
			Ok(guard) => guard?,
			Err(_) => return Ok(0),
		};

		let ring_buf = guard.get_inner_mut();
		let mut drained = 0;
		while let Some(item) = ring_buf.next() {
			on_record(item.as_ref());
			drained += 1;
		}

		guard.clear_ready();
		Ok(drained)
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
	pub drained: u64,
	pub decoded: u64,
	pub malformed: u64,
	pub dropped: u64,
}

/// Drains a [`RecordSource`], decodes each record and hands it to the publish side.
pub struct RingBufConsumer<S> {
	source: Option<S>,
	tx: Tx<AgentEvent>,
	stats: ConsumerStats,
}

impl<S: RecordSource> RingBufConsumer<S> {
	pub fn new(source: S, tx: Tx<AgentEvent>) -> Self {
		RingBufConsumer {
			source: Some(source),
			tx,
			stats: ConsumerStats::default(),
		}
	}

	pub async fn poll(&mut self, timeout: Duration) -> Result<usize> {
		let RingBufConsumer { source, tx, stats } = self;
		let source = source.as_mut().ok_or(Error::ConsumerClosed)?;

		// Runs while the buffer is being drained: decode and hand off, nothing that can block.
		let on_record = |data: &[u8]| {
			stats.drained += 1;
			match decode(data) {
				Ok(evt) => {
					stats.decoded += 1;
					if let Err(err) = tx.try_send(evt) {
						stats.dropped += 1;
						warn!("dropping exec event: {err}");
					}
				}
				Err(err) => {
					stats.malformed += 1;
					warn!("failed to decode record: {err}");
				}
			}
		};

		let drained = source.poll_records(timeout, on_record).await?;
		if drained > 0 {
			debug!("drained {drained} records");
		}

		Ok(drained)
	}

	/// Releases the source. Safe to call more than once.
	pub fn close(&mut self) {
		if self.source.take().is_some() {
			info!(
				"ring buffer consumer closed (drained: {}, decoded: {}, malformed: {}, dropped: {})",
				self.stats.drained, self.stats.decoded, self.stats.malformed, self.stats.dropped
			);
		}
	}

	pub fn is_closed(&self) -> bool {
		self.source.is_none()
	}

	pub fn stats(&self) -> ConsumerStats {
		self.stats
	}
}
