mod event;

pub use event::{ExecRecord, COMMAND_LEN, EXEC_RECORD_SIZE, MESSAGE_LEN};
