//! In-memory streams for running commands without a terminal.

use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Shared buffer a [`MemWriter`] appends to.
pub type OutputBuffer = Rc<RefCell<Vec<u8>>>;

/// Memory-backed reader.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl crate::command::Stdin for MemReader {
    /// Child processes get no input when the session is not attached to a terminal.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Memory-backed writer. Several writers may append to the same buffer.
pub struct MemWriter {
    buf: OutputBuffer,
}

impl MemWriter {
    /// Writer that appends to `buf`.
    pub fn sharing(buf: OutputBuffer) -> Self {
        Self { buf }
    }

    /// Create writer and return (writer, buffer handle).
    pub fn with_handle() -> (Self, OutputBuffer) {
        let buf = OutputBuffer::default();
        (Self::sharing(buf.clone()), buf)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl crate::command::Stdout for MemWriter {
    /// Child process output is discarded; only in-process commands are captured.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}
