use derive_more::From;

use crate::{decoder::ExecEvent, sampler::CounterSample};

/// What the acquisition side hands to the publish worker.
#[derive(From, Clone, Debug)]
pub enum AgentEvent {
	#[from]
	Exec(ExecEvent),
	#[from]
	Sample(CounterSample),
}
