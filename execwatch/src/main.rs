use clap::Parser;
use execwatch::{
	agent::{bump_memlock_rlimit, init_tracing, run},
	cli::args::Cli,
	config::AgentConfig,
	Result,
};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();
	let _tracing_guard = init_tracing(args.log_file.as_deref());

	let config = AgentConfig::from_cli(&args)?;

	bump_memlock_rlimit();

	run(config).await
}
