// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::sync::Arc;
use crate::{Buffer, Error, Result};
use crate::error::Operation::{BufFlush, BufRead, BufWrite};
use crate::pool::Pool;
use crate::segment::SIZE;
use crate::streams::{BufSink, BufSource, BufStream, Sink, Source, Stream};
use crate::streams::cancel::CancelScope;

pub fn buffer_source<S: Source>(source: S) -> BufferedSource<S> {
	BufferedSource::new(source)
}

pub fn buffer_sink<S: Sink>(sink: S) -> BufferedSink<S> {
	BufferedSink::new(sink)
}

/// A [`Source`] wrapper pulling whole segments from its inner source into a
/// buffer on demand, exposing the typed [`BufSource`] surface over it.
/// Closing closes the inner source; closing is idempotent, and every other
/// operation on a closed source fails.
pub struct BufferedSource<S: Source> {
	buffer: Buffer,
	source: S,
	closed: bool,
	/// Total bytes ever pulled from the inner source. The owner's consumed
	/// total is this minus the buffered count; peeks anchor on it.
	filled: u64,
	scope: Option<Arc<dyn CancelScope>>,
}

impl<S: Source> BufferedSource<S> {
	fn new(source: S) -> Self {
		Self {
			buffer: Buffer::default(),
			source,
			closed: false,
			filled: 0,
			scope: None,
		}
	}

	/// Returns a reference to the inner source.
	pub fn inner(&self) -> &S { &self.source }

	/// Attaches a cooperative cancellation scope, polled between segment
	/// pulls.
	pub fn set_cancel_scope(&mut self, scope: Arc<dyn CancelScope>) {
		self.scope = Some(scope);
	}

	/// Returns the total bytes the owner has consumed past the buffer.
	pub(crate) fn consumed(&self) -> u64 {
		self.filled - self.buffer.count() as u64
	}

	/// Returns a forward-only view anchored at the current position. The
	/// view shares this source's buffer and pulls more on demand; consuming
	/// this source past the view's position invalidates it. Reading from
	/// the upstream mid-peek goes through [`Peek::upstream_mut`].
	pub fn peek(&mut self) -> Peek<'_, S> {
		Peek {
			base: self.consumed(),
			offset: 0,
			source: self,
		}
	}

	fn check_open(&self) -> Result {
		if self.closed {
			Err(Error::closed(BufRead))
		} else {
			Ok(())
		}
	}

	fn check_scope(&self) -> Result {
		match &self.scope {
			Some(scope) => scope.check(),
			None => Ok(()),
		}
	}
}

impl<S: Source> Stream for BufferedSource<S> {
	fn is_closed(&self) -> bool { self.closed }

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;
		let buf_close = self.buffer.close();
		let src_close = self.source.close();
		buf_close?;
		src_close
	}
}

impl<S: Source> Source for BufferedSource<S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		self.check_open()?;
		if self.buffer.is_empty() && !self.request(min(byte_count, SIZE))? {
			return Ok(0)
		}
		self.buffer.read(sink, byte_count)
	}
}

impl<S: Source> BufStream for BufferedSource<S> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Source> BufSource for BufferedSource<S> {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		self.check_open()?;
		while self.buffer.count() < byte_count {
			self.check_scope()?;
			// Round the pull up to whole segments.
			let deficit = byte_count - self.buffer.count();
			let want = deficit.checked_next_multiple_of(SIZE).unwrap_or(deficit);
			let pulled = self.source
				.read(&mut self.buffer, want)
				.map_err(|err| err.with_op(BufRead))?;
			if pulled == 0 {
				return Ok(false)
			}
			self.filled += pulled as u64;
		}
		Ok(true)
	}
}

impl<S: Source> Drop for BufferedSource<S> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// A forward-only read view over a [`BufferedSource`], anchored where the
/// source stood when it was created. Valid until the source consumes past
/// the view's position; afterwards every operation fails with an
/// `Invalidated` error. Reading from it never consumes from the source.
///
/// A peek is itself a [`Source`]; wrap it with
/// [`buffered`](crate::streams::SourceExt::buffered) for the typed surface.
pub struct Peek<'a, S: Source> {
	source: &'a mut BufferedSource<S>,
	/// The source's consumed total when the peek was created.
	base: u64,
	/// Bytes this peek has advanced past its anchor.
	offset: usize,
}

impl<S: Source> Peek<'_, S> {
	/// Returns the source, for consuming it mid-peek. Doing so past this
	/// peek's position invalidates the peek.
	pub fn upstream_mut(&mut self) -> &mut BufferedSource<S> {
		self.source
	}

	/// The absolute position of the next byte this peek would read.
	fn position(&self) -> u64 {
		self.base + self.offset as u64
	}

	fn check_valid(&self) -> Result<usize> {
		let consumed = self.source.consumed();
		if consumed > self.position() {
			return Err(Error::invalidated(BufRead))
		}
		Ok((self.position() - consumed) as usize)
	}
}

impl<S: Source> Stream for Peek<'_, S> { }

impl<S: Source> Source for Peek<'_, S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		let at = self.check_valid()?;
		if !self.source.request(at.saturating_add(1))? {
			return Ok(0)
		}

		let available = self.source.buf().count() - at;
		let n = min(byte_count, available);
		self.source.buf().copy_to(sink, at, n)?;
		self.offset += n;
		Ok(n)
	}
}

/// A [`Sink`] wrapper accumulating writes into a buffer and handing filled
/// segments downstream. [`emit`] pushes only complete segments; [`flush`]
/// pushes everything including the pending tail. Closing flushes once and
/// closes the inner sink; a failed flush leaves the unwritten bytes
/// buffered.
///
/// [`emit`]: BufSink::emit
/// [`flush`]: Sink::flush
pub struct BufferedSink<W: Sink> {
	buffer: Buffer,
	sink: W,
	closed: bool,
	scope: Option<Arc<dyn CancelScope>>,
}

impl<W: Sink> BufferedSink<W> {
	fn new(sink: W) -> Self {
		Self {
			buffer: Buffer::default(),
			sink,
			closed: false,
			scope: None,
		}
	}

	/// Returns a reference to the inner sink.
	pub fn inner(&self) -> &W { &self.sink }

	/// Attaches a cooperative cancellation scope, polled between segment
	/// writes.
	pub fn set_cancel_scope(&mut self, scope: Arc<dyn CancelScope>) {
		self.scope = Some(scope);
	}

	fn check_open(&self) -> Result {
		if self.closed {
			Err(Error::closed(BufWrite))
		} else {
			Ok(())
		}
	}

	fn check_scope(&self) -> Result {
		match &self.scope {
			Some(scope) => scope.check(),
			None => Ok(()),
		}
	}
}

impl<W: Sink> Stream for BufferedSink<W> {
	fn is_closed(&self) -> bool { self.closed }

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;
		// Each step must run; the first failure surfaces.
		let flush = self.sink
			.write_all(&mut self.buffer)
			.and_then(|_| self.sink.flush())
			.map_err(|err| err.with_op(BufFlush));
		let close = self.sink.close();
		let clear = self.buffer.close();
		flush?;
		close?;
		clear
	}
}

impl<W: Sink> Sink for BufferedSink<W> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		self.check_open()?;
		self.check_scope()?;
		let count = self.buffer.write(source, byte_count)?;
		self.emit()?;
		Ok(count)
	}

	fn flush(&mut self) -> Result {
		self.check_open()?;
		// Both get a chance to run before an error returns.
		let drain = self.sink
			.write_all(&mut self.buffer)
			.map_err(|err| err.with_op(BufFlush));
		let flush = self.sink
			.flush()
			.map_err(|err| err.with_op(BufFlush));
		drain?;
		flush
	}
}

impl<W: Sink> BufStream for BufferedSink<W> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<W: Sink> BufSink for BufferedSink<W> {
	fn check_writable(&self) -> Result {
		self.check_open()
	}

	/// Writes the buffered complete segments downstream, keeping the
	/// pending tail.
	fn emit(&mut self) -> Result {
		self.check_open()?;
		self.check_scope()?;
		let count = self.buffer.complete_segment_count();
		if count > 0 {
			self.sink
				.write(&mut self.buffer, count)
				.map_err(|err| err.with_op(BufFlush))?;
		}
		Ok(())
	}
}

impl<W: Sink> Drop for BufferedSink<W> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
