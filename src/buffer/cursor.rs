// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use crate::{Buffer, Error, Result};
use crate::error::Operation::Cursor;
use crate::pool::{Pool, SharedPool};
use crate::segment::SIZE;

/// A raw view of a buffer's segments for zero-copy bulk access.
///
/// The cursor borrows its buffer exclusively, so a second simultaneous
/// binding is unrepresentable. The remaining misuse — operations after
/// [`close`], or writes through a read-only binding — fails with a `State`
/// error.
///
/// Position is tracked as a signed offset: `-1` is the sentinel before the
/// first byte, the byte count is the sentinel after the last. In either
/// sentinel state [`data`] is `None` and [`pos`]/[`limit`] are `-1`.
///
/// [`close`]: Self::close
/// [`data`]: Self::data
/// [`pos`]: Self::pos
/// [`limit`]: Self::limit
pub struct UnsafeCursor<'b, P: Pool = SharedPool> {
	buffer: &'b mut Buffer<P>,
	readwrite: bool,
	closed: bool,
	offset: i64,
	/// Index of the bound segment and position within its readable window.
	seg: Option<(usize, usize)>,
}

impl<'b, P: Pool> UnsafeCursor<'b, P> {
	pub(super) fn bind(buffer: &'b mut Buffer<P>, readwrite: bool) -> Self {
		Self {
			buffer,
			readwrite,
			closed: false,
			offset: -1,
			seg: None,
		}
	}

	/// Returns the absolute offset, `-1` before the first byte.
	pub fn offset(&self) -> i64 { self.offset }

	/// Returns the readable bytes of the bound segment at the cursor offset,
	/// or `None` in a sentinel state.
	pub fn data(&self) -> Option<&[u8]> {
		let (index, at) = self.seg?;
		let seg = self.buffer.segments.get(index)?;
		Some(&seg.data()[at..])
	}

	/// Returns the position of the cursor within the bound segment's
	/// readable window, or `-1` in a sentinel state.
	pub fn pos(&self) -> i64 {
		self.seg.map_or(-1, |(_, at)| at as i64)
	}

	/// Returns the length of the bound segment's readable window, or `-1` in
	/// a sentinel state.
	pub fn limit(&self) -> i64 {
		self.seg
			.and_then(|(index, _)| self.buffer.segments.get(index))
			.map_or(-1, |seg| seg.len() as i64)
	}

	/// Returns the writable bytes of the bound segment at the cursor offset,
	/// forking a shared page first. Requires a read-write binding.
	pub fn data_mut(&mut self) -> Result<Option<&mut [u8]>> {
		self.check_open()?;
		self.check_readwrite()?;

		let Some((index, at)) = self.seg else { return Ok(None) };
		let seg = self.buffer.segments.get_mut(index)
			.expect("the bound segment index should be valid");
		Ok(Some(&mut seg.data_mut()[at..]))
	}

	/// Moves the cursor to `offset`, returning the number of readable bytes
	/// in the newly bound segment, or `-1` when the offset lands in a
	/// sentinel state. Offsets past the end clamp to the after-last
	/// sentinel; offsets below `-1` clamp to before-first.
	pub fn seek(&mut self, offset: i64) -> Result<i64> {
		self.check_open()?;
		let count = self.buffer.count() as i64;

		if offset < 0 {
			self.offset = -1;
			self.seg = None;
			return Ok(-1)
		}
		if offset >= count {
			self.offset = count;
			self.seg = None;
			return Ok(-1)
		}

		let (index, start) = self.buffer.segments.locate(offset as usize);
		let at = offset as usize - start;
		self.offset = offset;
		self.seg = Some((index, at));

		let len = self.buffer.segments.get(index)
			.expect("the located segment index should be valid")
			.len();
		Ok((len - at) as i64)
	}

	/// Advances to the next segment, returning the number of readable bytes
	/// there, or `-1` past the last segment.
	pub fn next(&mut self) -> Result<i64> {
		self.check_open()?;
		let target = match self.seg {
			None if self.offset < 0 => 0,
			None => return self.seek(self.buffer.count() as i64),
			Some((index, at)) => {
				let len = self.buffer.segments.get(index)
					.expect("the bound segment index should be valid")
					.len();
				self.offset + (len - at) as i64
			}
		};
		self.seek(target)
	}

	/// Grows or shrinks the buffer to exactly `new_size` bytes. Growth
	/// appends uninitialized bytes at the tail and binds the cursor to the
	/// first of them; shrinking truncates the tail, moving a cursor left
	/// beyond it to the after-last sentinel. Requires a read-write binding.
	pub fn resize(&mut self, new_size: usize) -> Result {
		self.check_open()?;
		self.check_readwrite()?;

		let old = self.buffer.count();
		if new_size > old {
			let mut remaining = new_size - old;
			while remaining > 0 {
				let seg = self.buffer.writable_back()?;
				let n = min(remaining, seg.lim());
				seg.add(n);
				remaining -= n;
			}
			self.seek(old as i64)?;
		} else if new_size == old {
			self.seek(old as i64)?;
		} else {
			let mut excess = old - new_size;
			while excess > 0 {
				let back = self.buffer.segments.back_mut()
					.expect("bytes remain while shrinking");
				if back.len() <= excess {
					excess -= back.len();
					let seg = self.buffer.segments.pop_back()
						.expect("the back segment was just inspected");
					self.buffer.pool.recycle_one(seg)?;
				} else {
					let keep = back.len() - excess;
					back.truncate(keep);
					excess = 0;
				}
			}
			let offset = min(self.offset, new_size as i64);
			self.seek(offset)?;
		}
		Ok(())
	}

	/// Opens at least `min_byte_count` contiguous writable bytes at the
	/// tail, binding the cursor to the first of them, and returns the number
	/// of bytes added to the buffer. Requires a read-write binding.
	pub fn expand(&mut self, min_byte_count: usize) -> Result<usize> {
		self.check_open()?;
		self.check_readwrite()?;
		if min_byte_count > SIZE {
			return Err(Error::invalid_input(
				Cursor,
				"expansion should fit a single segment",
			))
		}

		let old = self.buffer.count();
		let added = {
			let seg = self.buffer.writable_back()?;
			if seg.lim() < min_byte_count {
				let fresh = self.buffer.pool.claim_one()?;
				self.buffer.segments.push_back(fresh);
			}
			let seg = self.buffer.segments.back_mut()
				.expect("a writable segment was just ensured");
			let added = seg.lim();
			seg.add(added);
			added
		};
		self.seek(old as i64)?;
		Ok(added)
	}

	/// Unbinds the cursor. A second close fails with a `State` error; the
	/// borrow itself ends when the cursor drops.
	pub fn close(&mut self) -> Result {
		self.check_open()?;
		self.closed = true;
		self.seg = None;
		self.offset = -1;
		Ok(())
	}

	fn check_open(&self) -> Result {
		if self.closed {
			Err(Error::state(Cursor, "the cursor is closed"))
		} else {
			Ok(())
		}
	}

	fn check_readwrite(&self) -> Result {
		if !self.readwrite {
			Err(Error::state(Cursor, "the cursor is bound read-only"))
		} else {
			Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::Buffer;
	use crate::error::ErrorKind;

	#[test]
	fn sentinel_states() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"abcdef").unwrap();
		let size = buf.count() as i64;

		let mut cursor = buf.cursor();
		assert_eq!(cursor.seek(-1).unwrap(), -1);
		assert_eq!(cursor.offset(), -1);
		assert_eq!(cursor.pos(), -1);
		assert_eq!(cursor.limit(), -1);
		assert!(cursor.data().is_none());

		assert_eq!(cursor.seek(size).unwrap(), -1);
		assert_eq!(cursor.offset(), size);
		assert!(cursor.data().is_none());

		// Offsets beyond the total clamp to after-last.
		assert_eq!(cursor.seek(size + 10).unwrap(), -1);
		assert_eq!(cursor.offset(), size);
	}

	#[test]
	fn next_walks_segments() {
		let mut buf = Buffer::default();
		buf.write_from_slice(&[b'a'; crate::segment::SIZE]).unwrap();
		buf.write_from_slice(&[b'b'; 100]).unwrap();

		let mut cursor = buf.cursor();
		let first = cursor.next().unwrap();
		assert_eq!(first, crate::segment::SIZE as i64);
		assert_eq!(cursor.offset(), 0);

		let second = cursor.next().unwrap();
		assert_eq!(second, 100);
		assert_eq!(cursor.data().unwrap()[0], b'b');

		assert_eq!(cursor.next().unwrap(), -1);
	}

	#[test]
	fn resize_truncates_and_grows() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"hello world").unwrap();

		{
			let mut cursor = buf.cursor_mut();
			cursor.resize(5).unwrap();
			assert_eq!(cursor.offset(), 5);
			assert!(cursor.data().is_none());
		}
		assert_eq!(buf.count(), 5);

		{
			let mut cursor = buf.cursor_mut();
			cursor.resize(10).unwrap();
			assert_eq!(cursor.offset(), 5);
			let data = cursor.data_mut().unwrap().unwrap();
			data.fill(b'!');
		}
		assert_eq!(buf.count(), 10);
		let mut text = String::new();
		buf.read_all_utf8(&mut text).unwrap();
		assert_eq!(text, "hello!!!!!");
	}

	#[test]
	fn expand_opens_contiguous_tail() {
		let mut buf = Buffer::default();
		buf.write_from_slice(&[b'x'; crate::segment::SIZE - 10]).unwrap();

		let mut cursor = buf.cursor_mut();
		let added = cursor.expand(100).unwrap();
		assert!(added >= 100);
		assert_eq!(cursor.offset(), (crate::segment::SIZE - 10) as i64);
		assert!(cursor.data().unwrap().len() >= 100);
	}

	#[test]
	fn misuse_is_a_state_error() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"abc").unwrap();

		let mut read_only = buf.cursor();
		assert_eq!(
			read_only.resize(10).unwrap_err().kind,
			ErrorKind::State,
		);

		let mut cursor = buf.cursor();
		cursor.close().unwrap();
		assert_eq!(cursor.close().unwrap_err().kind, ErrorKind::State);
		assert_eq!(cursor.seek(0).unwrap_err().kind, ErrorKind::State);
	}

	#[test]
	fn write_through_cursor() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"abcdef").unwrap();
		let snapshot = buf.snapshot();

		{
			let mut cursor = buf.cursor_mut();
			cursor.seek(2).unwrap();
			cursor.data_mut().unwrap().unwrap()[0] = b'X';
		}

		let mut text = String::new();
		buf.read_all_utf8(&mut text).unwrap();
		assert_eq!(text, "abXdef");
		// The shared snapshot saw nothing; the write forked the page.
		assert_eq!(snapshot.to_vec(), b"abcdef");
	}
}
