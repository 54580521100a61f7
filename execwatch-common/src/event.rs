use zerocopy::byteorder::little_endian::I32;
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const COMMAND_LEN: usize = 16;
pub const MESSAGE_LEN: usize = 12;

/// Size of one record on the wire. Shared with the kernel program, do not change on one side only.
pub const EXEC_RECORD_SIZE: usize = 36;

/// One exec observed by the kernel program, as written into the ring buffer.
///
/// Layout: `pid` at 0, `uid` at 4, `command` at 8, `message` at 24, little-endian integers.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ExecRecord {
	pub pid: I32,
	pub uid: I32,
	pub command: [u8; COMMAND_LEN],
	pub message: [u8; MESSAGE_LEN],
}

const _: () = assert!(core::mem::size_of::<ExecRecord>() == EXEC_RECORD_SIZE);

impl ExecRecord {
	/// Builds a record the way the kernel side fills it: text is truncated to leave room for the NUL.
	pub fn new(pid: i32, uid: i32, command: &str, message: &str) -> Self {
		ExecRecord {
			pid: I32::new(pid),
			uid: I32::new(uid),
			command: fill_c_str::<COMMAND_LEN>(command),
			message: fill_c_str::<MESSAGE_LEN>(message),
		}
	}
}

fn fill_c_str<const N: usize>(text: &str) -> [u8; N] {
	let mut buf = [0u8; N];
	let len = text.len().min(N - 1);
	buf[..len].copy_from_slice(&text.as_bytes()[..len]);
	buf
}
