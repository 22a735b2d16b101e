// ABOUTME: Build output sink shared by every deployment operation.
// ABOUTME: Fans bytes out to any number of writers and mirrors status lines into tracing.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

type Sink = Box<dyn Write + Send>;

/// Cloneable handle that broadcasts everything written to it.
///
/// Clones share the same set of writers, so a handle can be moved into a
/// background log pump or a blocking git task while the caller keeps writing.
/// A writer that fails is dropped from the set; the others keep receiving.
#[derive(Clone, Default)]
pub struct Output {
    sinks: Arc<Mutex<Vec<Sink>>>,
}

impl Output {
    /// An output with no writers. Status lines still reach tracing.
    pub fn new() -> Self {
        Self::default()
    }

    /// An output writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new().with_writer(io::stdout())
    }

    pub fn with_writer(self, writer: impl Write + Send + 'static) -> Self {
        self.add_writer(writer);
        self
    }

    /// Attach another writer to every clone of this handle.
    pub fn add_writer(&self, writer: impl Write + Send + 'static) {
        self.sinks.lock().push(Box::new(writer));
    }

    /// Write one progress line.
    pub fn progress(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "keel::output", "{message}");
        self.write_line(message);
    }

    /// Write one warning line.
    pub fn warning(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!(target: "keel::output", "{message}");
        self.write_line(&format!("WARNING: {message}"));
    }

    /// Forward raw bytes, e.g. container log chunks.
    pub fn raw(&self, bytes: &[u8]) {
        self.broadcast(bytes);
    }

    fn write_line(&self, line: &str) {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.broadcast(&buf);
    }

    fn broadcast(&self, bytes: &[u8]) {
        let mut sinks = self.sinks.lock();
        sinks.retain_mut(|sink| match sink.write_all(bytes).and_then(|()| sink.flush()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("dropping output writer: {e}");
                false
            }
        });
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.broadcast(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("writers", &self.sinks.lock().len())
            .finish()
    }
}

/// In-memory writer whose contents stay readable after it is handed to an `Output`.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
