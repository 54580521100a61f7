use std::{net::SocketAddr, path::PathBuf, time::Duration};

use tracing::debug;

use crate::{
	cli::args::{Cli, PublisherKind, RunMode, SweepArg, UpdateModeArg},
	error::{Error, Result},
	publisher::UpdateMode,
	sampler::SweepStrategy,
};

const PID_MAX_PATH: &str = "/proc/sys/kernel/pid_max";
/// Kernel default when `pid_max` cannot be read.
const PID_MAX_DEFAULT: i32 = 32768;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
	RingBuf { pin: PathBuf, poll_timeout: Duration },
	Map { pin: PathBuf, sweep: SweepStrategy, interval: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherConfig {
	Pull { listen: SocketAddr },
	Push { gateway: String, job: String },
}

/// Validated agent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
	pub source: Source,
	pub publisher: PublisherConfig,
	pub update_mode: UpdateMode,
	pub channel_capacity: usize,
	pub run_time: Option<Duration>,
}

impl AgentConfig {
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		if cli.channel_capacity == 0 {
			return Err(Error::InvalidChannelCapacity);
		}

		let source = match cli.mode {
			RunMode::Events => Source::RingBuf {
				pin: cli.ringbuf_pin.clone(),
				poll_timeout: *cli.poll_timeout,
			},
			RunMode::Sampling => {
				let sweep = match cli.sweep {
					SweepArg::Keys => SweepStrategy::Keys,
					SweepArg::Range => {
						let max_key = match cli.max_pid {
							Some(max) if max <= 0 => return Err(Error::InvalidMaxPid(max)),
							Some(max) => max,
							None => read_pid_max(),
						};
						SweepStrategy::Range { max_key }
					}
				};
				Source::Map {
					pin: cli.map_pin.clone(),
					sweep,
					interval: *cli.interval,
				}
			}
		};

		let publisher = match cli.publisher {
			PublisherKind::Pull => PublisherConfig::Pull { listen: cli.listen },
			PublisherKind::Push => PublisherConfig::Push {
				gateway: cli.gateway.clone().ok_or(Error::MissingGateway)?,
				job: cli.job.clone(),
			},
		};

		let update_mode = match cli.update_mode {
			Some(UpdateModeArg::Set) => UpdateMode::Set,
			Some(UpdateModeArg::Increment) => UpdateMode::Increment,
			None => default_update_mode(cli.mode),
		};

		Ok(AgentConfig {
			source,
			publisher,
			update_mode,
			channel_capacity: cli.channel_capacity,
			run_time: cli.time.as_ref().map(|d| **d),
		})
	}
}

/// One increment per exec event; the map counter is already cumulative so it is set.
pub fn default_update_mode(mode: RunMode) -> UpdateMode {
	match mode {
		RunMode::Events => UpdateMode::Increment,
		RunMode::Sampling => UpdateMode::Set,
	}
}

/// Highest pid the kernel hands out, inclusive.
pub fn read_pid_max() -> i32 {
	match std::fs::read_to_string(PID_MAX_PATH) {
		Ok(content) => parse_pid_max(&content).unwrap_or(PID_MAX_DEFAULT),
		Err(err) => {
			debug!("cannot read {PID_MAX_PATH}: {err}");
			PID_MAX_DEFAULT
		}
	}
}

// pid_max is exclusive, keys go up to pid_max - 1.
fn parse_pid_max(content: &str) -> Option<i32> {
	let pid_max = content.trim().parse::<i32>().ok()?;
	(pid_max > 0).then(|| pid_max - 1)
}
