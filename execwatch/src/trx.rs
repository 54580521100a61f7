use crate::{Error, Result};
use flume::TrySendError;

/// Bounded so a slow sink never grows memory on the ring buffer path.
pub fn new_bounded_channel<T>(name: &'static str, capacity: usize) -> (Tx<T>, Rx<T>) {
	let (tx, rx) = flume::bounded(capacity);

	(Tx(tx, name), Rx(rx, name))
}

pub struct Tx<T>(flume::Sender<T>, &'static str);

impl<T> Tx<T> {
	/// Never blocks. A full channel is reported as `Error::ChannelFull`.
	pub fn try_send(&self, value: impl Into<T>) -> Result<()> {
		match self.0.try_send(value.into()) {
			Ok(()) => Ok(()),
			Err(TrySendError::Full(_)) => Err(Error::ChannelFull(self.1)),
			Err(err) => Err(err.into()),
		}
	}

	pub async fn send(&self, value: impl Into<T>) -> Result<()> {
		self.0.send_async(value.into()).await?;
		Ok(())
	}
}

impl<T> Clone for Tx<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone(), self.1)
	}
}

pub struct Rx<T>(flume::Receiver<T>, &'static str);

impl<T> Rx<T> {
	pub async fn recv(&self) -> Result<T> {
		let res = self.0.recv_async().await?;
		Ok(res)
	}

	pub fn try_recv(&self) -> Option<T> {
		self.0.try_recv().ok()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn name(&self) -> &'static str {
		self.1
	}
}

impl<T> Clone for Rx<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone(), self.1)
	}
}
