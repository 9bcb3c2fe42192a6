//! Stream source and stream result abstractions
//!
//! A transform reads its stylesheet and document through a [`StreamSource`]
//! and writes its serialized output into a [`StreamResult`]. Both wrap
//! handles that must be closed explicitly; closing is idempotent.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A readable handle that needs an explicit close.
pub trait InputHandle: Read + Send {
    /// Release the handle. Calling it again is a no-op.
    fn close(&mut self) -> io::Result<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

/// A writable handle that needs an explicit close.
///
/// In-memory sinks keep their content after being closed so that the
/// caller can still extract it.
pub trait OutputHandle: Write + Send {
    /// Flush and release the handle. Calling it again is a no-op.
    fn close(&mut self) -> io::Result<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;

    /// Accumulated text, for in-memory character writers
    fn text(&self) -> Option<io::Result<String>> {
        None
    }

    /// Accumulated bytes, for in-memory byte sinks
    fn bytes(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Raw input behind a [`StreamSource`]
pub enum SourceHandle {
    /// A file the engine opens (and closes) itself
    File(PathBuf),
    /// A character reader
    Reader(Box<dyn InputHandle>),
    /// A byte input stream
    Stream(Box<dyn InputHandle>),
}

impl SourceHandle {
    /// Close the underlying reader or stream. Files need no close.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            SourceHandle::File(_) => Ok(()),
            SourceHandle::Reader(reader) => reader.close(),
            SourceHandle::Stream(stream) => stream.close(),
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceHandle::File(path) => f.debug_tuple("File").field(path).finish(),
            SourceHandle::Reader(_) => f.write_str("Reader"),
            SourceHandle::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Input for a transform: a stylesheet or a source document.
#[derive(Debug)]
pub struct StreamSource {
    handle: SourceHandle,
}

impl StreamSource {
    pub fn new(handle: SourceHandle) -> Self {
        Self { handle }
    }

    /// Path of the file behind this source, if it is file based
    pub fn system_id(&self) -> Option<&Path> {
        match &self.handle {
            SourceHandle::File(path) => Some(path),
            _ => None,
        }
    }

    /// The byte input stream, if this source wraps one
    pub fn input_stream(&mut self) -> Option<&mut dyn InputHandle> {
        match &mut self.handle {
            SourceHandle::Stream(stream) => Some(stream.as_mut()),
            _ => None,
        }
    }

    /// The character reader, if this source wraps one
    pub fn reader(&mut self) -> Option<&mut dyn InputHandle> {
        match &mut self.handle {
            SourceHandle::Reader(reader) => Some(reader.as_mut()),
            _ => None,
        }
    }

    /// Read the whole input as text.
    ///
    /// Byte input is decoded as UTF-8; a leading byte order mark is dropped.
    pub fn read_to_string(&mut self) -> Result<String> {
        match &mut self.handle {
            SourceHandle::File(path) => {
                let bytes = fs::read(&*path).map_err(|e| {
                    Error::Io(io::Error::new(e.kind(), format!("{} ({})", path.display(), e)))
                })?;
                decode_utf8(bytes)
            }
            SourceHandle::Reader(reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Ok(text)
            }
            SourceHandle::Stream(stream) => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                decode_utf8(bytes)
            }
        }
    }

    /// Close the input stream if there is one, otherwise the reader.
    pub fn close(&mut self) -> io::Result<()> {
        self.handle.close()
    }

    pub fn into_handle(self) -> SourceHandle {
        self.handle
    }
}

fn decode_utf8(mut bytes: Vec<u8>) -> Result<String> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    String::from_utf8(bytes)
        .map_err(|e| Error::xml_parse(format!("input is not valid UTF-8: {}", e)))
}

/// Output of a transform.
pub struct StreamResult {
    handle: Box<dyn OutputHandle>,
}

impl StreamResult {
    pub fn new(handle: Box<dyn OutputHandle>) -> Self {
        Self { handle }
    }

    /// The writer the serialized result goes to
    pub fn writer(&mut self) -> &mut dyn OutputHandle {
        self.handle.as_mut()
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.handle.close()
    }

    pub fn into_handle(self) -> Box<dyn OutputHandle> {
        self.handle
    }
}

impl std::fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}
