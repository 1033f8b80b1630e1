// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use crate::{Buffer, Error, Result};
use crate::error::{ErrorKind, Operation};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// Creates an in-memory pipe: bytes written to the [`PipeSink`] become
/// readable from the [`PipeSource`], through a single handoff buffer bounded
/// at `max_buffered` bytes. The writer blocks while the buffer is full, the
/// reader while it is empty, so backpressure is intrinsic; ordering and
/// at-most-once delivery follow from the single buffer.
pub fn pipe(max_buffered: usize) -> (PipeSink, PipeSource) {
	let shared = Arc::new(Shared {
		state: Mutex::new(State {
			buffer: Buffer::default(),
			sink_closed: false,
			source_closed: false,
		}),
		space: Condvar::new(),
		bytes: Condvar::new(),
		max: max_buffered.max(1),
	});
	(
		PipeSink { shared: shared.clone() },
		PipeSource { shared },
	)
}

struct State {
	buffer: Buffer,
	sink_closed: bool,
	source_closed: bool,
}

struct Shared {
	state: Mutex<State>,
	/// Signalled when buffered bytes drain below the bound.
	space: Condvar,
	/// Signalled when bytes arrive or a side closes.
	bytes: Condvar,
	max: usize,
}

impl Shared {
	fn lock(&self, op: Operation) -> Result<MutexGuard<'_, State>> {
		self.state
			.lock()
			.map_err(|_| Error::new(op, ErrorKind::Io, Some(PipePoisoned.into())))
	}
}

#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("the pipe lock was poisoned")]
struct PipePoisoned;

/// The writing half of a [`pipe`].
pub struct PipeSink {
	shared: Arc<Shared>,
}

/// The reading half of a [`pipe`].
pub struct PipeSource {
	shared: Arc<Shared>,
}

impl Stream for PipeSink {
	fn close(&mut self) -> Result {
		let mut state = self.shared.lock(Operation::BufFlush)?;
		state.sink_closed = true;
		self.shared.bytes.notify_all();
		Ok(())
	}
}

impl Sink for PipeSink {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if source.count() < byte_count {
			return Err(Error::eof(Operation::BufWrite))
		}

		let mut remaining = byte_count;
		while remaining > 0 {
			let mut state = self.shared.lock(Operation::BufWrite)?;
			if state.sink_closed {
				return Err(Error::closed(Operation::BufWrite))
			}

			while state.buffer.count() >= self.shared.max && !state.source_closed {
				state = self.shared.space
					.wait(state)
					.map_err(|_| Error::new(
						Operation::BufWrite,
						ErrorKind::Io,
						Some(PipePoisoned.into()),
					))?;
			}
			if state.source_closed {
				return Err(Error::closed(Operation::BufWrite))
			}

			let room = self.shared.max - state.buffer.count();
			let n = min(room, remaining);
			state.buffer.write(source, n)?;
			remaining -= n;
			self.shared.bytes.notify_all();
		}
		Ok(byte_count)
	}
}

impl Drop for PipeSink {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

impl Stream for PipeSource {
	fn close(&mut self) -> Result {
		let mut state = self.shared.lock(Operation::BufRead)?;
		state.source_closed = true;
		let cleared = state.buffer.clear();
		self.shared.space.notify_all();
		cleared
	}
}

impl Source for PipeSource {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		let mut state = self.shared.lock(Operation::BufRead)?;
		if state.source_closed {
			return Err(Error::closed(Operation::BufRead))
		}

		while state.buffer.is_empty() && !state.sink_closed {
			state = self.shared.bytes
				.wait(state)
				.map_err(|_| Error::new(
					Operation::BufRead,
					ErrorKind::Io,
					Some(PipePoisoned.into()),
				))?;
		}
		if state.buffer.is_empty() {
			return Ok(0)
		}

		let read = state.buffer.read(sink, byte_count)?;
		self.shared.space.notify_all();
		Ok(read)
	}
}

impl Drop for PipeSource {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
