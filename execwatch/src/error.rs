use derive_more::{Display, From};
use flume::{RecvError, SendError, TrySendError};
use tokio::task::JoinError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	#[from(String, &String, &str)]
	Custom(String),
	EventSend(String),
	EventRecv(RecvError),
	#[display("Channel '{_0}' is full")]
	ChannelFull(&'static str),

	// -- Pinned kernel objects
	#[display("Cannot open pinned map '{path}': {cause}")]
	PinnedMapOpen { path: String, cause: String },
	#[display("Cannot open pinned ring buffer '{path}': {cause}")]
	PinnedRingBufOpen { path: String, cause: String },
	#[display("Ring buffer consumer already closed")]
	ConsumerClosed,

	// -- Publishing
	#[display("Counter metrics cannot be decremented (got {_0})")]
	NegativeIncrement(i64),

	// -- Config
	#[display("Push publishing requires --gateway")]
	MissingGateway,
	#[display("Channel capacity must be greater than zero")]
	InvalidChannelCapacity,
	#[display("Max pid must be positive (got {_0})")]
	InvalidMaxPid(i32),

	// -- Externals
	#[from]
	JoinError(JoinError),
	#[from]
	AyaMaps(aya::maps::MapError),
	#[from]
	Prometheus(prometheus::Error),
	#[from]
	Http(reqwest::Error),
	#[from]
	Io(std::io::Error),
}

impl<T> From<SendError<T>> for Error {
	fn from(value: SendError<T>) -> Self {
		Self::EventSend(value.to_string())
	}
}

impl<T> From<TrySendError<T>> for Error {
	fn from(value: TrySendError<T>) -> Self {
		Self::EventSend(value.to_string())
	}
}

impl From<RecvError> for Error {
	fn from(err: RecvError) -> Self {
		Self::EventRecv(err)
	}
}

// region:    --- Custom

impl Error {
	pub fn custom(val: impl Into<String>) -> Self {
		Self::Custom(val.into())
	}
}

// endregion: --- Custom

// region:    --- Error Boilerplate

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
