// SPDX-License-Identifier: Apache-2.0

mod cursor;
mod options;
mod read;
mod write;

use std::cmp::min;
use std::fmt;
use itertools::Itertools;
use crate::{Error, Result, ResultExt};
use crate::byte_str::Snapshot;
use crate::error::Operation::{BufClear, BufCompact, BufCopy, BufRead};
use crate::pattern;
use crate::pool::{Pool, SharedPool};
use crate::segment::{Segment, SegmentRing, SIZE};
use crate::streams::Stream;

pub use cursor::UnsafeCursor;
pub use options::{BufferOptions, Utf8Replacement};

/// An ordered list of [`Segment`]s acting as both a readable and writable
/// byte stream. Transfers between buffers move or share segments rather than
/// copying bytes whenever alignment allows; see [`Source::read`] and
/// [`Sink::write`].
///
/// A buffer is exclusively owned: one logical holder at a time, transferred
/// by move. [Snapshots](Self::snapshot) and [clones](Clone::clone) share
/// segment pages copy-on-write, so either side can keep reading (even from
/// another thread) while the owner mutates.
///
/// [`Source::read`]: crate::streams::Source::read
/// [`Sink::write`]: crate::streams::Sink::write
pub struct Buffer<P: Pool = SharedPool> {
	pub(crate) pool: P,
	pub(crate) segments: SegmentRing<SIZE>,
	options: BufferOptions,
}

impl Default for Buffer {
	fn default() -> Self { Self::new(SharedPool::get()) }
}

impl Buffer {
	/// Creates a buffer that always shares and compacts.
	pub fn lean() -> Self {
		Self::with_options(SharedPool::get(), BufferOptions::lean())
	}
}

impl<P: Pool> Buffer<P> {
	pub fn new(pool: P) -> Self {
		Self::with_options(pool, BufferOptions::default())
	}

	pub fn with_options(pool: P, options: BufferOptions) -> Self {
		Self {
			pool,
			segments: SegmentRing::new(),
			options,
		}
	}

	/// Returns the number of readable bytes.
	pub fn count(&self) -> usize {
		self.segments.count()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.iter().all(Segment::is_empty)
	}

	pub fn options(&self) -> BufferOptions { self.options }

	/// Recycles all segments, leaving the buffer empty.
	pub fn clear(&mut self) -> Result {
		self.pool
			.recycle(self.segments.drain())
			.context(BufClear)
	}

	/// Consumes up to `byte_count` bytes, returning the number skipped.
	pub fn skip(&mut self, mut byte_count: usize) -> Result<usize> {
		let mut skipped = 0;
		while byte_count > 0 {
			let Some(seg) = self.segments.front_mut() else { break };
			let n = min(byte_count, seg.len());
			seg.consume(n);
			skipped += n;
			byte_count -= n;

			if seg.is_empty() {
				let seg = self.segments.pop_front()
					.expect("the front segment was just inspected");
				self.pool.recycle_one(seg).context(BufRead)?;
			}
		}
		Ok(skipped)
	}

	/// Consumes the remaining bytes.
	pub fn skip_all(&mut self) -> Result<usize> {
		self.skip(self.count())
	}

	/// Returns the byte at `index`, or `None` if `index` is out of bounds.
	pub fn get(&self, mut index: usize) -> Option<u8> {
		for chunk in self.chunks() {
			if index < chunk.len() {
				return Some(chunk[index])
			}
			index -= chunk.len();
		}
		None
	}

	/// Returns the least index in `from..to` holding `byte`, scanning across
	/// segment boundaries. `to` is clamped to the byte count; an empty or
	/// inverted range finds nothing.
	pub fn find_byte(&self, byte: u8, from: usize, to: usize) -> Option<usize> {
		pattern::find_byte(self.chunks(), byte, from, min(to, self.count()))
	}

	/// Returns the least index at or past `from` where `needle` occurs,
	/// matching across segment boundaries. An empty needle matches
	/// everywhere, so the result is `from` itself.
	pub fn find_slice(&self, needle: &[u8], from: usize) -> Option<usize> {
		if needle.is_empty() {
			return Some(from)
		}
		pattern::find_slice(self.chunks(), needle, from)
	}

	/// Appends shared copies of the range `offset..offset + byte_count` to
	/// `sink` without consuming from this buffer.
	pub fn copy_to(
		&self,
		sink: &mut Buffer<impl Pool>,
		offset: usize,
		byte_count: usize,
	) -> Result {
		for seg in self.share_range(offset, byte_count).context(BufCopy)? {
			sink.segments.push_back(seg);
		}
		Ok(())
	}

	/// Appends shared copies of the range `offset..offset + byte_count` to
	/// this buffer's own tail. Reading continues from the original head.
	pub fn copy_to_self(&mut self, offset: usize, byte_count: usize) -> Result {
		for seg in self.share_range(offset, byte_count).context(BufCopy)? {
			self.segments.push_back(seg);
		}
		Ok(())
	}

	/// Returns an immutable, segment-sharing view of the current contents.
	/// The snapshot's bytes are frozen at call time; later buffer mutations
	/// are invisible to it.
	pub fn snapshot(&self) -> Snapshot {
		Snapshot::over_segments(self.segments.iter())
	}

	/// Fills partial segments into their predecessors to free space,
	/// recycling the emptied segments.
	pub fn compact(&mut self) -> Result {
		let mut compacted: Vec<Segment<SIZE>> = Vec::with_capacity(self.segments.len());
		while let Some(mut seg) = self.segments.pop_front() {
			if seg.is_empty() {
				self.pool.recycle_one(seg).context(BufCompact)?;
				continue
			}
			if let Some(last) = compacted.last_mut() {
				if last.can_absorb(&seg) {
					let n = seg.len();
					seg.move_into(last, n);
					self.pool.recycle_one(seg).context(BufCompact)?;
					continue
				}
			}
			compacted.push(seg);
		}
		for seg in compacted {
			self.segments.push_back(seg);
		}
		Ok(())
	}

	/// Returns the byte count that can be handed downstream without splitting
	/// the pending tail: everything up to a tail segment that still accepts
	/// writes.
	pub fn complete_segment_count(&self) -> usize {
		match self.segments.back() {
			None => 0,
			Some(b) if b.is_full() || b.is_shared() => self.count(),
			Some(b) => self.count() - b.len(),
		}
	}

	/// Binds a read-only cursor over the buffer's segments.
	pub fn cursor(&mut self) -> UnsafeCursor<'_, P> {
		UnsafeCursor::bind(self, false)
	}

	/// Binds a read-write cursor over the buffer's segments.
	pub fn cursor_mut(&mut self) -> UnsafeCursor<'_, P> {
		UnsafeCursor::bind(self, true)
	}

	pub(crate) fn chunks(&self) -> impl Iterator<Item = &[u8]> {
		self.segments.iter().map(Segment::data)
	}

	/// Returns the first readable byte without consuming it.
	pub(crate) fn peek_byte(&self) -> Option<u8> {
		self.chunks().find(|c| !c.is_empty()).map(|c| c[0])
	}

	fn share_range(&self, offset: usize, byte_count: usize) -> Result<Vec<Segment<SIZE>>> {
		let in_bounds = offset.checked_add(byte_count)
			.is_some_and(|end| end <= self.count());
		if !in_bounds {
			return Err(Error::invalid_input(
				BufCopy,
				"range should be within the readable bytes",
			))
		}

		let mut shares = Vec::new();
		let mut remaining = byte_count;
		let mut pos = 0;
		for seg in self.segments.iter() {
			if remaining == 0 { break }
			let len = seg.len();
			if offset >= pos + len {
				pos += len;
				continue
			}

			let start = offset.saturating_sub(pos);
			let end = min(start + remaining, len);
			if end > start {
				shares.push(seg.share_range(start, end));
				remaining -= end - start;
			}
			pos += len;
		}
		Ok(shares)
	}

	/// Appends a segment moved from another buffer, folding it into the tail
	/// segment when the payload fits there.
	pub(crate) fn push_moved(&mut self, mut seg: Segment<SIZE>) -> Result {
		if seg.is_empty() {
			return self.pool.recycle_one(seg)
		}
		if let Some(back) = self.segments.back_mut() {
			if back.can_absorb(&seg) {
				let n = seg.len();
				seg.move_into(back, n);
				return self.pool.recycle_one(seg)
			}
		}
		self.segments.push_back(seg);
		Ok(())
	}

	/// Returns the back segment with writable space, claiming a fresh one
	/// from the pool when the tail is full, shared, or absent.
	pub(crate) fn writable_back(&mut self) -> Result<&mut Segment<SIZE>> {
		let reusable = matches!(
			self.segments.back(),
			Some(b) if !b.is_shared() && b.lim() + b.slack() > 0
		);
		if !reusable {
			let seg = self.pool.claim_one()?;
			self.segments.push_back(seg);
		}

		let seg = self.segments.back_mut()
			.expect("a writable segment was just ensured");
		if seg.is_full() {
			seg.shift();
		}
		Ok(seg)
	}

	/// Walks readable segments, consuming the byte count returned by
	/// `consume` from each slice until it is exhausted or `max_count` is
	/// reached.
	pub(crate) fn read_segments(
		&mut self,
		mut max_count: usize,
		mut consume: impl FnMut(&[u8]) -> Result<usize>,
	) -> Result<usize> {
		let mut count = 0;
		while max_count > 0 {
			let Some(seg) = self.segments.front_mut() else { break };
			if seg.is_empty() {
				let seg = self.segments.pop_front()
					.expect("the front segment was just inspected");
				self.pool.recycle_one(seg)?;
				continue
			}

			let len = min(max_count, seg.len());
			let read = consume(&seg.data()[..len])?;
			seg.consume(read);
			count += read;
			max_count -= read;

			if seg.is_empty() {
				let seg = self.segments.pop_front()
					.expect("the front segment was just inspected");
				self.pool.recycle_one(seg)?;
			}
			if read < len { break }
		}
		Ok(count)
	}

	/// Walks writable tail space, adding the byte count returned by `write`
	/// into each slice until `count` bytes are written or `write` stalls.
	pub(crate) fn write_segments(
		&mut self,
		mut count: usize,
		mut write: impl FnMut(&mut [u8]) -> Result<usize>,
	) -> Result<usize> {
		let mut written = 0;
		while count > 0 {
			let seg = self.writable_back()?;
			let limit = min(count, seg.lim());
			let n = write(&mut seg.tail_mut()[..limit])?;
			seg.add(n);
			written += n;
			count -= n;
			if n == 0 { break }
		}
		Ok(written)
	}

	/// Recycles emptied edge segments and compacts when fragmentation passes
	/// the configured threshold.
	pub(crate) fn tidy(&mut self) -> Result {
		while matches!(self.segments.front(), Some(s) if s.is_empty()) {
			let seg = self.segments.pop_front()
				.expect("the front segment was just inspected");
			self.pool.recycle_one(seg)?;
		}

		if self.segments.len() > 1 && self.fragmentation() >= self.options.compact_threshold {
			self.compact()?;
		}
		Ok(())
	}

	/// Returns the interior space lost to partially read or written segments.
	fn fragmentation(&self) -> usize {
		let len = self.segments.len();
		self.segments.iter()
			.enumerate()
			.map(|(i, seg)| {
				if i + 1 == len {
					seg.slack()
				} else {
					seg.slack() + seg.lim()
				}
			})
			.sum()
	}
}

impl<P: Pool + Clone> Clone for Buffer<P> {
	/// Returns a buffer sharing this buffer's segment pages. Both sides may
	/// mutate independently afterwards; shared pages copy on write.
	fn clone(&self) -> Self {
		let mut segments = SegmentRing::new();
		for seg in self.segments.iter().filter(|s| !s.is_empty()) {
			segments.push_back(seg.share_all());
		}
		Self {
			pool: self.pool.clone(),
			segments,
			options: self.options,
		}
	}
}

impl<P: Pool> Drop for Buffer<P> {
	fn drop(&mut self) {
		let _ = self.clear();
	}
}

impl<P: Pool> Stream for Buffer<P> {
	/// Clears the buffer. Buffers have no close state; they remain usable.
	fn close(&mut self) -> Result {
		self.clear()
	}
}

impl<P: Pool> fmt::Debug for Buffer<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const PREVIEW: usize = 64;
		let count = self.count();
		let hex = self.chunks()
			.flatten()
			.take(PREVIEW)
			.map(|b| format!("{b:02x}"))
			.join("");
		let ellipsis = if count > PREVIEW { "…" } else { "" };
		write!(f, "Buffer[{count}] {hex}{ellipsis}")
	}
}

impl<P: Pool, Q: Pool> PartialEq<Buffer<Q>> for Buffer<P> {
	fn eq(&self, other: &Buffer<Q>) -> bool {
		self.count() == other.count() &&
		self.chunks().flatten().eq(other.chunks().flatten())
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::Buffer;

	#[test]
	fn copy_does_not_consume() {
		let mut src = Buffer::default();
		src.write_from_slice(b"hello world").unwrap();

		let mut dst = Buffer::default();
		src.copy_to(&mut dst, 6, 5).unwrap();

		assert_eq!(dst.count(), 5);
		assert_eq!(src.count(), 11);
		assert_eq!(dst.get(0), Some(b'w'));
	}

	#[test]
	fn copy_to_self_appends() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"abc").unwrap();
		buf.copy_to_self(0, 3).unwrap();

		assert_eq!(buf.count(), 6);
		assert_eq!(buf.get(3), Some(b'a'));
		assert_eq!(buf.get(0), Some(b'a'));
	}

	#[test]
	fn clone_sides_are_independent() {
		let mut a = Buffer::default();
		a.write_from_slice(b"shared start").unwrap();

		let mut b = a.clone();
		b.write_from_slice(b" plus b").unwrap();
		a.write_from_slice(b" plus a").unwrap();

		let mut a_read = String::new();
		let mut b_read = String::new();
		a.read_all_utf8(&mut a_read).unwrap();
		b.read_all_utf8(&mut b_read).unwrap();
		assert_eq!(a_read, "shared start plus a");
		assert_eq!(b_read, "shared start plus b");
	}

	#[test]
	fn complete_segments_exclude_open_tail() {
		let mut buf = Buffer::default();
		buf.write_from_slice(&[b'x'; crate::segment::SIZE]).unwrap();
		buf.write_from_slice(b"tail").unwrap();

		assert_eq!(buf.complete_segment_count(), crate::segment::SIZE);

		let mut filled = Buffer::default();
		filled.write_from_slice(&[b'y'; crate::segment::SIZE]).unwrap();
		assert_eq!(filled.complete_segment_count(), crate::segment::SIZE);
	}
}
