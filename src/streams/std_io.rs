// SPDX-License-Identifier: Apache-2.0

//! Interop with `std::io`: any [`Read`]/[`Write`] transport (files, sockets,
//! TLS streams) becomes a [`Source`]/[`Sink`], and any source/sink can be
//! driven as a [`Read`]/[`Write`].

use std::io::{self, Read, Write};
use crate::{Buffer, Error, Result};
use crate::error::Operation::{BufFlush, BufRead, BufWrite};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// A [`Source`] filling buffers from a [`Read`].
pub struct ReaderSource<R: Read> {
	reader: R,
	closed: bool,
}

impl<R: Read> ReaderSource<R> {
	pub fn new(reader: R) -> Self {
		Self { reader, closed: false }
	}

	pub fn inner(&self) -> &R { &self.reader }

	pub fn inner_mut(&mut self) -> &mut R { &mut self.reader }
}

impl<R: Read> From<R> for ReaderSource<R> {
	fn from(value: R) -> Self { Self::new(value) }
}

impl<R: Read> Stream for ReaderSource<R> {
	fn is_closed(&self) -> bool { self.closed }

	/// Marks the source closed. The underlying resource is released when
	/// the reader drops.
	fn close(&mut self) -> Result {
		self.closed = true;
		Ok(())
	}
}

impl<R: Read> Source for ReaderSource<R> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(BufRead))
		}
		sink.write_std(&mut self.reader, byte_count)
			.map_err(|err| err.with_op(BufRead))
	}
}

/// A [`Sink`] draining buffers into a [`Write`].
pub struct WriterSink<W: Write> {
	writer: W,
	closed: bool,
}

impl<W: Write> WriterSink<W> {
	pub fn new(writer: W) -> Self {
		Self { writer, closed: false }
	}

	pub fn inner(&self) -> &W { &self.writer }

	pub fn inner_mut(&mut self) -> &mut W { &mut self.writer }
}

impl<W: Write> From<W> for WriterSink<W> {
	fn from(value: W) -> Self { Self::new(value) }
}

impl<W: Write> Stream for WriterSink<W> {
	fn is_closed(&self) -> bool { self.closed }

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;
		self.flush()
	}
}

impl<W: Write> Sink for WriterSink<W> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(BufWrite))
		}
		if source.count() < byte_count {
			return Err(Error::eof(BufWrite))
		}
		let writer = &mut self.writer;
		source.read_segments(byte_count, |chunk| {
			writer.write_all(chunk)?;
			Ok(chunk.len())
		})
	}

	fn flush(&mut self) -> Result {
		self.writer
			.flush()
			.map_err(|err| Error::io(BufFlush, err))
	}
}

/// Drives a [`Source`] as a [`Read`].
pub struct SourceReader<S: Source>(S);

impl<S: Source> SourceReader<S> {
	pub fn new(source: S) -> Self { Self(source) }

	pub fn into_inner(self) -> S { self.0 }
}

impl<S: Source> Read for SourceReader<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let Self(source) = self;
		let mut buffer = Buffer::default();
		let count = source
			.read(&mut buffer, buf.len())
			.map_err(Error::into_io)?;
		buffer.read_into_slice_exact(&mut buf[..count])
			.map_err(Error::into_io)?;
		Ok(count)
	}
}

/// Drives a [`Sink`] as a [`Write`].
pub struct SinkWriter<W: Sink>(W);

impl<W: Sink> SinkWriter<W> {
	pub fn new(sink: W) -> Self { Self(sink) }

	pub fn into_inner(self) -> W { self.0 }
}

impl<W: Sink> Write for SinkWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let Self(sink) = self;
		let mut buffer = Buffer::default();
		buffer.write_from_slice(buf).map_err(Error::into_io)?;
		sink.write_all(&mut buffer).map_err(Error::into_io)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush().map_err(Error::into_io)
	}
}
