use std::{net::SocketAddr, sync::Arc};

use axum::{
	extract::State,
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::TEXT_FORMAT;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;

use super::{MetricPublisher, MetricRegistry};

/// Updates land in the shared registry; scrapes read it through [`MetricsServer`].
pub struct PullPublisher {
	registry: Arc<MetricRegistry>,
}

impl PullPublisher {
	pub fn new(registry: Arc<MetricRegistry>) -> Self {
		PullPublisher { registry }
	}
}

impl MetricPublisher for PullPublisher {
	async fn update(&self, label: &str, value: i64) -> Result<()> {
		self.registry.update(label, value)
	}

	fn registry(&self) -> &MetricRegistry {
		&self.registry
	}
}

pub struct MetricsServer {
	listener: TcpListener,
	registry: Arc<MetricRegistry>,
}

impl MetricsServer {
	pub async fn bind(addr: SocketAddr, registry: Arc<MetricRegistry>) -> Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		Ok(MetricsServer { listener, registry })
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.listener.local_addr()?)
	}

	pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
		info!("serving metrics on http://{}/metrics", self.local_addr()?);

		let app = Router::new()
			.route("/metrics", get(serve_metrics))
			.with_state(self.registry);

		axum::serve(self.listener, app)
			.with_graceful_shutdown(async move { shutdown.cancelled().await })
			.await?;

		info!("metrics server stopped");
		Ok(())
	}
}

async fn serve_metrics(State(registry): State<Arc<MetricRegistry>>) -> Response {
	match registry.encode() {
		Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
		Err(err) => {
			warn!("failed to encode metrics: {err}");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		}
	}
}
