use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use humantime::Duration;

#[derive(Parser, Debug)]
#[command(name = "execwatch", about = "Exports exec events from pinned eBPF maps as metrics")]
pub struct Cli {
	#[arg(long, value_enum, default_value = "events")]
	pub mode: RunMode,

	#[arg(long, env = "EXECWATCH_RINGBUF_PIN", default_value = "/sys/fs/bpf/output")]
	pub ringbuf_pin: PathBuf,

	#[arg(long, env = "EXECWATCH_MAP_PIN", default_value = "/sys/fs/bpf/execCounter")]
	pub map_pin: PathBuf,

	#[arg(long, value_enum, default_value = "pull")]
	pub publisher: PublisherKind,

	#[arg(long, env = "EXECWATCH_LISTEN", default_value = "0.0.0.0:9100")]
	pub listen: SocketAddr,

	#[arg(
		long,
		env = "EXECWATCH_GATEWAY",
		help = "Push gateway address (e.g., localhost:9091). REQUIRED when using --publisher push"
	)]
	pub gateway: Option<String>,

	#[arg(long, default_value = "execwatch")]
	pub job: String,

	#[arg(long, value_enum, help = "Defaults to 'increment' in events mode and 'set' in sampling mode")]
	pub update_mode: Option<UpdateModeArg>,

	#[arg(long, default_value = "1s")]
	pub poll_timeout: Duration,

	#[arg(long, default_value = "2s", help = "Pause between two map sweeps")]
	pub interval: Duration,

	#[arg(long, value_enum, default_value = "range")]
	pub sweep: SweepArg,

	#[arg(long, help = "Highest key swept in 'range' mode. Defaults to /proc/sys/kernel/pid_max")]
	pub max_pid: Option<i32>,

	#[arg(long, default_value_t = 4096)]
	pub channel_capacity: usize,

	#[arg(long, help = "Time duration (e.g., 20s, 5m, 1h). Runs until a signal when omitted")]
	pub time: Option<Duration>,

	#[arg(long, env = "EXECWATCH_LOG_FILE", help = "Daily rolling log file instead of stdout")]
	pub log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
	Events,
	Sampling,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum PublisherKind {
	Pull,
	Push,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum UpdateModeArg {
	Set,
	Increment,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum SweepArg {
	Range,
	Keys,
}
