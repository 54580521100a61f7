use std::{sync::Arc, time::Duration};

use prometheus::TEXT_FORMAT;
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::{debug, warn};

use crate::Result;

use super::{MetricPublisher, MetricRegistry};

const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends the whole registry to a push gateway after every update.
pub struct PushPublisher {
	registry: Arc<MetricRegistry>,
	client: Client,
	url: String,
}

impl PushPublisher {
	pub fn new(registry: Arc<MetricRegistry>, gateway: &str, job: &str) -> Result<Self> {
		let client = Client::builder().timeout(PUSH_TIMEOUT).build()?;

		Ok(PushPublisher {
			registry,
			client,
			url: push_url(gateway, job),
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// PUT replaces every metric of the job group with the current snapshot.
	pub async fn push(&self) -> Result<()> {
		let body = self.registry.encode()?;

		self.client
			.put(&self.url)
			.header(CONTENT_TYPE, TEXT_FORMAT)
			.body(body)
			.send()
			.await?
			.error_for_status()?;

		debug!("pushed metrics to {}", self.url);
		Ok(())
	}
}

impl MetricPublisher for PushPublisher {
	async fn update(&self, label: &str, value: i64) -> Result<()> {
		self.registry.update(label, value)?;

		// The next update retries with a fresh snapshot.
		if let Err(err) = self.push().await {
			warn!("push to {} failed: {err}", self.url);
		}

		Ok(())
	}

	fn registry(&self) -> &MetricRegistry {
		&self.registry
	}
}

fn push_url(gateway: &str, job: &str) -> String {
	let gateway = gateway.trim_end_matches('/');
	if gateway.starts_with("http://") || gateway.starts_with("https://") {
		format!("{gateway}/metrics/job/{job}")
	} else {
		format!("http://{gateway}/metrics/job/{job}")
	}
}
