use std::path::Path;

use aya::maps::{HashMap, Map, MapData, MapError};
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Keys between two yields to the runtime during a sweep.
const SWEEP_YIELD_EVERY: usize = 4096;

/// Point lookups against a key -> counter map.
pub trait CounterMap: Send + Sync {
	/// `Ok(None)` when the key has no entry.
	fn get(&self, key: i32) -> Result<Option<i64>>;

	/// Keys currently present in the map.
	fn keys(&self) -> Result<Vec<i32>>;
}

/// Pinned BPF hash map, `pid -> exec count`.
pub struct PinnedCounterMap {
	map: HashMap<MapData, i32, i64>,
}

impl PinnedCounterMap {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let open_err = |cause: MapError| Error::PinnedMapOpen {
			path: path.display().to_string(),
			cause: cause.to_string(),
		};

		let map_data = MapData::from_pin(path).map_err(open_err)?;
		let map = HashMap::try_from(Map::HashMap(map_data)).map_err(open_err)?;

		Ok(PinnedCounterMap { map })
	}
}

impl CounterMap for PinnedCounterMap {
	fn get(&self, key: i32) -> Result<Option<i64>> {
		match self.map.get(&key, 0) {
			Ok(value) => Ok(Some(value)),
			Err(MapError::KeyNotFound) => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	fn keys(&self) -> Result<Vec<i32>> {
		let keys = self.map.keys().collect::<core::result::Result<Vec<_>, MapError>>()?;
		Ok(keys)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
	pub key: i32,
	pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStrategy {
	/// Every key in `[0, max_key]`.
	Range { max_key: i32 },
	/// Only the keys the map reports.
	Keys,
}

pub struct MapSampler<M> {
	map: M,
	strategy: SweepStrategy,
}

impl<M: CounterMap> MapSampler<M> {
	pub fn new(map: M, strategy: SweepStrategy) -> Self {
		MapSampler { map, strategy }
	}

	pub fn strategy(&self) -> SweepStrategy {
		self.strategy
	}

	/// `None` for an absent key, and for a failed lookup (logged). A stored zero is `Some(0)`.
	pub fn lookup(&self, key: i32) -> Option<i64> {
		match self.map.get(key) {
			Ok(value) => value,
			Err(err) => {
				warn!("lookup of key {key} failed: {err}");
				None
			}
		}
	}

	/// One full pass over the key space, keeping entries with a positive count.
	pub async fn sweep(&self) -> Sweep {
		match self.strategy {
			SweepStrategy::Range { max_key } => self.sweep_keys(0..=max_key).await,
			SweepStrategy::Keys => match self.map.keys() {
				Ok(keys) => self.sweep_keys(keys).await,
				Err(err) => {
					warn!("listing map keys failed: {err}");
					Sweep::default()
				}
			},
		}
	}

	// Failed lookups are counted and reported once per sweep.
	async fn sweep_keys(&self, keys: impl IntoIterator<Item = i32>) -> Sweep {
		let mut sweep = Sweep::default();
		let mut first_failure = None;

		for (i, key) in keys.into_iter().enumerate() {
			if i > 0 && i % SWEEP_YIELD_EVERY == 0 {
				tokio::task::yield_now().await;
			}

			match self.map.get(key) {
				Ok(Some(value)) if value > 0 => sweep.samples.push(CounterSample { key, value }),
				Ok(Some(_)) => {}
				Ok(None) => trace!("key {key} absent"),
				Err(err) => {
					sweep.failed += 1;
					first_failure.get_or_insert((key, err));
				}
			}
		}

		if let Some((key, err)) = first_failure {
			warn!("{} lookups failed during sweep (first: key {key}: {err})", sweep.failed);
		}

		sweep
	}
}

/// Result of one pass over the map.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Sweep {
	/// Entries with a positive count, in key order of the pass.
	pub samples: Vec<CounterSample>,
	pub failed: usize,
}

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use std::collections::BTreeMap;

	struct MemoryMap {
		entries: BTreeMap<i32, i64>,
		broken: Vec<i32>,
	}

	impl MemoryMap {
		fn new(entries: &[(i32, i64)]) -> Self {
			MemoryMap {
				entries: entries.iter().copied().collect(),
				broken: Vec::new(),
			}
		}
	}

	impl CounterMap for MemoryMap {
		fn get(&self, key: i32) -> crate::Result<Option<i64>> {
			if self.broken.contains(&key) {
				return Err(Error::custom("lookup failed"));
			}
			Ok(self.entries.get(&key).copied())
		}

		fn keys(&self) -> crate::Result<Vec<i32>> {
			Ok(self.entries.keys().copied().collect())
		}
	}

	#[test]
	fn lookup_distinguishes_zero_from_absent() -> Result<()> {
		// -- Setup & Fixtures
		let sampler = MapSampler::new(MemoryMap::new(&[(7, 0), (8, 3)]), SweepStrategy::Keys);

		// -- Exec & Check
		assert_eq!(sampler.lookup(7), Some(0));
		assert_eq!(sampler.lookup(8), Some(3));
		assert_eq!(sampler.lookup(9), None);

		Ok(())
	}

	#[test]
	fn lookup_failure_is_not_found() -> Result<()> {
		// -- Setup & Fixtures
		let mut map = MemoryMap::new(&[(5, 10)]);
		map.broken.push(5);
		let sampler = MapSampler::new(map, SweepStrategy::Keys);

		// -- Exec & Check
		assert_eq!(sampler.lookup(5), None);

		Ok(())
	}

	#[tokio::test]
	async fn range_sweep_keeps_positive_counts_in_bounds() -> Result<()> {
		// -- Setup & Fixtures
		let map = MemoryMap::new(&[(0, 1), (1, 0), (42, 5), (9000, 2), (10_001, 9)]);
		let sampler = MapSampler::new(map, SweepStrategy::Range { max_key: 10_000 });

		// -- Exec
		let sweep = sampler.sweep().await;

		// -- Check
		assert_eq!(sweep.failed, 0);
		assert_eq!(
			sweep.samples,
			vec![
				CounterSample { key: 0, value: 1 },
				CounterSample { key: 42, value: 5 },
				CounterSample { key: 9000, value: 2 },
			]
		);

		Ok(())
	}

	#[tokio::test]
	async fn keys_sweep_skips_failed_lookups() -> Result<()> {
		// -- Setup & Fixtures
		let mut map = MemoryMap::new(&[(100, 4), (200, 6), (300, 0)]);
		map.broken.push(200);
		let sampler = MapSampler::new(map, SweepStrategy::Keys);

		// -- Exec
		let sweep = sampler.sweep().await;

		// -- Check
		assert_eq!(sweep.samples, vec![CounterSample { key: 100, value: 4 }]);
		assert_eq!(sweep.failed, 1);

		Ok(())
	}

	#[tokio::test]
	async fn broken_range_sweep_counts_every_failure() -> Result<()> {
		// -- Setup & Fixtures
		let mut map = MemoryMap::new(&[(3, 2)]);
		map.broken = (0..=99).filter(|key| *key != 3).collect();
		let sampler = MapSampler::new(map, SweepStrategy::Range { max_key: 99 });

		// -- Exec
		let sweep = sampler.sweep().await;

		// -- Check
		assert_eq!(sweep.failed, 99);
		assert_eq!(sweep.samples, vec![CounterSample { key: 3, value: 2 }]);

		Ok(())
	}
}
