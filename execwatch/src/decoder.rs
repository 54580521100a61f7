use std::sync::Arc;

use derive_more::Display;
use execwatch_common::ExecRecord;
use zerocopy::FromBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DecodeError {
	#[display("Record of {len} bytes is shorter than 36")]
	TooShort { len: usize },
}

impl std::error::Error for DecodeError {}

/// Decoded exec record. Owns its text, so it outlives the ring buffer slot it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecEvent {
	pub pid: i32,
	pub uid: i32,
	pub command: Arc<str>,
	pub message: Arc<str>,
}

/// Decodes the first 36 bytes of `data`; anything past that is ignored.
pub fn decode(data: &[u8]) -> Result<ExecEvent, DecodeError> {
	let (record, _) = ExecRecord::read_from_prefix(data).map_err(|_| DecodeError::TooShort { len: data.len() })?;

	Ok(ExecEvent {
		pid: record.pid.get(),
		uid: record.uid.get(),
		command: c_str_lossy(&record.command),
		message: c_str_lossy(&record.message),
	})
}

// Text stops at the first NUL, whatever follows is not checked.
fn c_str_lossy(field: &[u8]) -> Arc<str> {
	let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
	Arc::from(String::from_utf8_lossy(&field[..len]))
}

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use execwatch_common::EXEC_RECORD_SIZE;
	use zerocopy::IntoBytes;

	#[test]
	fn decode_synthetic_record() -> Result<()> {
		// -- Setup & Fixtures
		let fx_record = ExecRecord::new(1234, 0, "bash", "exec");

		// -- Exec
		let evt = decode(fx_record.as_bytes())?;

		// -- Check
		assert_eq!(evt.pid, 1234);
		assert_eq!(evt.uid, 0);
		assert_eq!(&*evt.command, "bash");
		assert_eq!(&*evt.message, "exec");

		Ok(())
	}

	#[test]
	fn decode_is_deterministic() -> Result<()> {
		// -- Setup & Fixtures
		let mut fx_bytes = [0u8; EXEC_RECORD_SIZE];
		for (i, b) in fx_bytes.iter_mut().enumerate() {
			*b = (i as u8).wrapping_mul(37).wrapping_add(11);
		}

		// -- Exec
		let first = decode(&fx_bytes)?;
		let second = decode(&fx_bytes)?;

		// -- Check
		assert_eq!(first, second);

		Ok(())
	}

	#[test]
	fn decode_rejects_short_buffers() {
		for len in 0..EXEC_RECORD_SIZE {
			let fx_bytes = vec![0xAAu8; len];

			let res = decode(&fx_bytes);

			assert_eq!(res, Err(DecodeError::TooShort { len }));
		}
	}

	#[test]
	fn decode_ignores_trailing_bytes() -> Result<()> {
		// -- Setup & Fixtures
		let mut fx_bytes = ExecRecord::new(-7, 1000, "sshd", "exec").as_bytes().to_vec();
		// garbage after the terminator inside the field, and after the record
		fx_bytes[8 + 5] = b'X';
		fx_bytes.extend_from_slice(b"tail");

		// -- Exec
		let evt = decode(&fx_bytes)?;

		// -- Check
		assert_eq!(evt.pid, -7);
		assert_eq!(evt.uid, 1000);
		assert_eq!(&*evt.command, "sshd");

		Ok(())
	}

	#[test]
	fn decode_unterminated_field_uses_full_width() -> Result<()> {
		// -- Setup & Fixtures
		let mut fx_bytes = [0u8; EXEC_RECORD_SIZE];
		fx_bytes[8..24].copy_from_slice(b"0123456789abcdef");
		fx_bytes[24..36].copy_from_slice(b"Hello World!");

		// -- Exec
		let evt = decode(&fx_bytes)?;

		// -- Check
		assert_eq!(&*evt.command, "0123456789abcdef");
		assert_eq!(&*evt.message, "Hello World!");

		Ok(())
	}
}
