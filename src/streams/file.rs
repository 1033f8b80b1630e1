// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use crate::{Buffer, Result};
use crate::pool::Pool;
use crate::streams::{ReaderSource, Source, Stream, WriterSink};

/// A [`Source`] reading from a [`File`].
pub struct FileSource {
	source: ReaderSource<File>,
	read_count: usize,
	len: Option<usize>,
}

/// A [`Sink`](crate::streams::Sink) writing to a [`File`].
pub type FileSink = WriterSink<File>;

impl FileSource {
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
		File::open(path).map(Into::into)
	}
}

impl From<File> for FileSource {
	fn from(value: File) -> Self {
		let len = value.metadata().ok().map(|meta| meta.len() as usize);
		Self {
			source: value.into(),
			read_count: 0,
			len,
		}
	}
}

impl Stream for FileSource {
	fn is_closed(&self) -> bool {
		self.source.is_closed()
	}

	fn close(&mut self) -> Result {
		self.source.close()
	}
}

impl Source for FileSource {
	/// Reads up to the length taken from the file's metadata at open. Files
	/// can grow after being opened for reading; to keep end-of-input
	/// terminal, bytes appended after that point are never returned.
	fn read(&mut self, sink: &mut Buffer<impl Pool>, mut byte_count: usize) -> Result<usize> {
		if let Some(len) = self.len {
			let remaining = len.saturating_sub(self.read_count);
			if remaining == 0 {
				return Ok(0)
			}
			byte_count = byte_count.min(remaining);
		}
		let read = self.source.read(sink, byte_count)?;
		self.read_count += read;
		Ok(read)
	}
}

impl WriterSink<File> {
	/// Creates or truncates the file at `path` as a sink.
	pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
		File::create(path).map(Self::new)
	}

	/// Opens the file at `path` for appending.
	pub fn append<P: AsRef<Path>>(path: P) -> io::Result<Self> {
		OpenOptions::new()
			.append(true)
			.create(true)
			.open(path)
			.map(Self::new)
	}
}

#[cfg(test)]
mod test {
	use std::io::Write;
	use crate::streams::{BufSource, FileSink, FileSource, Sink, SourceExt};
	use crate::Buffer;

	#[test]
	fn file_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("data.txt");

		let mut sink = FileSink::create(&path).unwrap();
		let mut buf = Buffer::default();
		buf.write_from_slice(b"line one\nline two\n").unwrap();
		sink.write_all(&mut buf).unwrap();
		sink.inner_mut().flush().unwrap();

		let mut source = FileSource::open(&path).unwrap().buffered();
		let mut line = String::new();
		assert!(source.read_utf8_line(&mut line).unwrap());
		assert_eq!(line, "line one");
		line.clear();
		assert!(source.read_utf8_line(&mut line).unwrap());
		assert_eq!(line, "line two");
		assert!(source.exhausted().unwrap());
	}
}
