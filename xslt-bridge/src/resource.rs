//! Resource adapters
//!
//! Turn a path, a string or a byte buffer into the source and sink handles
//! the engine reads from and writes to.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;

use xslt_engine_traits::{InputHandle, OutputHandle, SourceHandle};

use crate::validate::Input;

/// Constructors for every (representation x direction) pair.
pub trait ResourceProvider: Send + Sync {
    /// A source read from `path` by the engine
    fn file_reader(&self, path: &Path) -> io::Result<SourceHandle>;

    /// A character reader over `text`
    fn string_reader(&self, text: &str) -> io::Result<SourceHandle>;

    /// A byte stream over a copy of `bytes`
    fn bytes_reader(&self, bytes: &[u8]) -> io::Result<SourceHandle>;

    fn file_writer(&self, path: &Path) -> io::Result<Box<dyn OutputHandle>>;

    fn string_writer(&self) -> io::Result<Box<dyn OutputHandle>>;

    fn bytes_writer(&self) -> io::Result<Box<dyn OutputHandle>>;

    /// Open `input` with the matching constructor
    fn open(&self, input: &Input) -> io::Result<SourceHandle> {
        match input {
            Input::File(path) => self.file_reader(path),
            Input::Text(text) => self.string_reader(text),
            Input::Buffer(bytes) => self.bytes_reader(bytes),
        }
    }
}

/// In-memory and file system resources
#[derive(Debug, Clone, Copy, Default)]
pub struct StdResources;

impl ResourceProvider for StdResources {
    fn file_reader(&self, path: &Path) -> io::Result<SourceHandle> {
        Ok(SourceHandle::File(path.to_path_buf()))
    }

    fn string_reader(&self, text: &str) -> io::Result<SourceHandle> {
        Ok(SourceHandle::Reader(Box::new(MemoryReader::new(text.as_bytes().to_vec()))))
    }

    fn bytes_reader(&self, bytes: &[u8]) -> io::Result<SourceHandle> {
        let copy: Vec<u8> = bytes.iter().copied().collect();
        Ok(SourceHandle::Stream(Box::new(MemoryReader::new(copy))))
    }

    fn file_writer(&self, path: &Path) -> io::Result<Box<dyn OutputHandle>> {
        let file = File::create(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{} ({})", path.display(), e)))?;
        Ok(Box::new(FileSink {
            writer: Some(BufWriter::new(file)),
        }))
    }

    fn string_writer(&self) -> io::Result<Box<dyn OutputHandle>> {
        Ok(Box::new(MemorySink::new(SinkKind::Text)))
    }

    fn bytes_writer(&self) -> io::Result<Box<dyn OutputHandle>> {
        Ok(Box::new(MemorySink::new(SinkKind::Bytes)))
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "Stream closed")
}

/// Reader over owned bytes
#[derive(Debug)]
pub struct MemoryReader {
    inner: Cursor<Vec<u8>>,
    closed: bool,
}

impl MemoryReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            closed: false,
        }
    }
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.inner.read(buf)
    }
}

impl InputHandle for MemoryReader {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Buffered file output; the file is released on close
#[derive(Debug)]
pub struct FileSink {
    writer: Option<BufWriter<File>>,
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.as_mut().ok_or_else(closed_error)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl OutputHandle for FileSink {
    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkKind {
    Text,
    Bytes,
}

/// Growable in-memory sink that keeps its content after close
#[derive(Debug)]
pub struct MemorySink {
    kind: SinkKind,
    buffer: Vec<u8>,
    closed: bool,
}

impl MemorySink {
    fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            buffer: Vec::with_capacity(1024),
            closed: false,
        }
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputHandle for MemorySink {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn text(&self) -> Option<io::Result<String>> {
        match self.kind {
            SinkKind::Text => Some(
                String::from_utf8(self.buffer.clone())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            ),
            SinkKind::Bytes => None,
        }
    }

    fn bytes(&self) -> Option<Vec<u8>> {
        match self.kind {
            SinkKind::Bytes => Some(self.buffer.clone()),
            SinkKind::Text => None,
        }
    }
}
