use std::collections::BTreeMap;

use prometheus::{proto::MetricFamily, Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};

use super::UpdateMode;

pub const PID_LABEL: &str = "pid";
pub const EXEC_COUNT_METRIC: &str = "execwatch_exec_count";
pub const EXEC_EVENTS_METRIC: &str = "execwatch_exec_events_total";

enum ExecMetric {
	Gauge(IntGaugeVec),
	Counter(IntCounterVec),
}

/// Per-pid exec metric. Prometheus metrics are atomic, so scrapes run alongside updates without a lock.
pub struct MetricRegistry {
	registry: Registry,
	metric: ExecMetric,
}

impl MetricRegistry {
	pub fn new(mode: UpdateMode) -> Result<Self> {
		let registry = Registry::new();

		let metric = match mode {
			UpdateMode::Set => {
				let gauge = IntGaugeVec::new(
					Opts::new(EXEC_COUNT_METRIC, "Exec count per pid, as read from the kernel map"),
					&[PID_LABEL],
				)?;
				registry.register(Box::new(gauge.clone()))?;
				ExecMetric::Gauge(gauge)
			}
			UpdateMode::Increment => {
				let counter = IntCounterVec::new(
					Opts::new(EXEC_EVENTS_METRIC, "Exec events observed per pid"),
					&[PID_LABEL],
				)?;
				registry.register(Box::new(counter.clone()))?;
				ExecMetric::Counter(counter)
			}
		};

		Ok(MetricRegistry { registry, metric })
	}

	/// Overwrites under `Set`, adds under `Increment`.
	pub fn update(&self, label: &str, value: i64) -> Result<()> {
		match &self.metric {
			ExecMetric::Gauge(gauge) => gauge.with_label_values(&[label]).set(value),
			ExecMetric::Counter(counter) => {
				let value = u64::try_from(value).map_err(|_| Error::NegativeIncrement(value))?;
				counter.with_label_values(&[label]).inc_by(value);
			}
		}
		Ok(())
	}

	/// Current value per label. Read-only: never creates an entry.
	pub fn snapshot(&self) -> BTreeMap<String, i64> {
		let mut values = BTreeMap::new();

		for family in self.registry.gather() {
			for metric in family.get_metric() {
				let Some(label) = metric.get_label().iter().find(|l| l.get_name() == PID_LABEL) else {
					continue;
				};
				let value = match self.metric {
					ExecMetric::Gauge(_) => metric.get_gauge().get_value(),
					ExecMetric::Counter(_) => metric.get_counter().get_value(),
				};
				values.insert(label.get_value().to_string(), value as i64);
			}
		}

		values
	}

	pub fn get(&self, label: &str) -> Option<i64> {
		self.snapshot().get(label).copied()
	}

	pub fn len(&self) -> usize {
		self.snapshot().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn gather(&self) -> Vec<MetricFamily> {
		self.registry.gather()
	}

	/// Text exposition format, the body served on `/metrics` and pushed to the gateway.
	pub fn encode(&self) -> Result<String> {
		let mut buf = Vec::new();
		TextEncoder::new().encode(&self.gather(), &mut buf)?;
		Ok(String::from_utf8_lossy(&buf).into_owned())
	}
}

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;

	#[test]
	fn set_mode_overwrites() -> Result<()> {
		// -- Setup & Fixtures
		let registry = MetricRegistry::new(UpdateMode::Set)?;

		// -- Exec
		registry.update("42", 5)?;
		registry.update("42", 5)?;

		// -- Check
		assert_eq!(registry.get("42"), Some(5));

		Ok(())
	}

	#[test]
	fn increment_mode_accumulates() -> Result<()> {
		// -- Setup & Fixtures
		let registry = MetricRegistry::new(UpdateMode::Increment)?;

		// -- Exec
		registry.update("42", 5)?;
		registry.update("42", 5)?;

		// -- Check
		assert_eq!(registry.get("42"), Some(10));

		Ok(())
	}

	#[test]
	fn increment_mode_rejects_negative() -> Result<()> {
		// -- Setup & Fixtures
		let registry = MetricRegistry::new(UpdateMode::Increment)?;

		// -- Exec
		let res = registry.update("1", -3);

		// -- Check
		assert!(matches!(res, Err(Error::NegativeIncrement(-3))));
		assert!(registry.is_empty());

		Ok(())
	}

	#[test]
	fn snapshot_does_not_create_entries() -> Result<()> {
		// -- Setup & Fixtures
		let registry = MetricRegistry::new(UpdateMode::Set)?;
		registry.update("7", 1)?;

		// -- Exec
		let missing = registry.get("8");

		// -- Check
		assert_eq!(missing, None);
		assert_eq!(registry.len(), 1);

		Ok(())
	}

	#[test]
	fn encode_text_exposition() -> Result<()> {
		// -- Setup & Fixtures
		let registry = MetricRegistry::new(UpdateMode::Set)?;
		registry.update("100", 3)?;

		// -- Exec
		let body = registry.encode()?;

		// -- Check
		assert!(body.contains("# TYPE execwatch_exec_count gauge"));
		assert!(body.contains("execwatch_exec_count{pid=\"100\"} 3"));

		Ok(())
	}
}
