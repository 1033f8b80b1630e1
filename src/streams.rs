// SPDX-License-Identifier: Apache-2.0

//! The stream contracts: raw [`Source`]s and [`Sink`]s moving whole segments
//! through [`Buffer`]s, and the buffered [`BufSource`]/[`BufSink`] surface
//! layering typed reads and writes on top.

mod file;
mod gzip;
#[cfg(feature = "hash")]
mod hashing;
mod pipe;
mod std_io;
mod void;
pub mod cancel;

pub use file::*;
pub use gzip::*;
#[cfg(feature = "hash")]
pub use hashing::*;
pub use pipe::*;
pub use std_io::*;
pub use void::*;

use std::cmp::min;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::mem;
use simdutf8::compat::Utf8Error;
use crate::{Buffer, ByteString, Error, Result};
use crate::buffered_wrappers::{buffer_sink, buffer_source, BufferedSink, BufferedSource};
use crate::byte_str::Snapshot;
use crate::error::Operation::{BufRead, BufWrite};
use crate::pool::{Pool, SharedPool};
use crate::segment::SIZE;

/// Closure behavior common to sources and sinks. Closing is idempotent;
/// default streams also close when dropped.
pub trait Stream {
	fn is_closed(&self) -> bool { false }

	fn close(&mut self) -> Result { Ok(()) }
}

/// A raw data source. Reading places bytes into a buffer's tail; `Ok(0)` is
/// only returned at end of input, never for a positive count with bytes
/// still available.
pub trait Source: Stream {
	/// Reads at most `byte_count` bytes into `sink`, returning the count
	/// read, or zero at end of input.
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize>;

	/// Reads all remaining bytes into `sink`.
	fn read_all(&mut self, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		let mut total = 0;
		loop {
			match self.read(sink, SIZE)? {
				0 => break Ok(total),
				n => total += n,
			}
		}
	}
}

/// A raw data sink. Writing drains exactly the requested count from a
/// buffer's head, or fails.
pub trait Sink: Stream {
	/// Writes exactly `byte_count` bytes from `source` into the sink,
	/// returning the count written.
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize>;

	/// Writes all bytes from `source` into the sink.
	fn write_all(&mut self, source: &mut Buffer<impl Pool>) -> Result<usize> {
		let count = source.count();
		self.write(source, count)
	}

	/// Writes all buffered data to its final target.
	fn flush(&mut self) -> Result { Ok(()) }
}

/// Wraps a source in a [`BufferedSource`].
pub trait SourceExt: Source + Sized {
	fn buffered(self) -> BufferedSource<Self> { buffer_source(self) }
}

impl<S: Source> SourceExt for S { }

/// Wraps a sink in a [`BufferedSink`].
pub trait SinkExt: Sink + Sized {
	fn buffered(self) -> BufferedSink<Self> { buffer_sink(self) }
}

impl<S: Sink> SinkExt for S { }

/// A stream holding a [`Buffer`].
pub trait BufStream<P: Pool = SharedPool> {
	fn buf(&self) -> &Buffer<P>;
	fn buf_mut(&mut self) -> &mut Buffer<P>;
}

macro_rules! gen_int_reads {
	($($be_name:ident $($le_name:ident)? -> $ty:ident,)+) => {
		$(gen_int_reads! { $be_name $($le_name)? -> $ty })+
	};
	($be_name:ident $le_name:ident -> $ty:ident) => {
		gen_int_reads! { $be_name -> $ty "big-endian " }
		gen_int_reads! { $le_name -> $ty "little-endian " }
	};
	($name:ident -> $ty:ident $($endian:literal)?) => {
		#[doc = concat!("Reads one ", $($endian,)? "[`", stringify!($ty), "`] from the source.")]
		fn $name(&mut self) -> Result<$ty> {
			self.require(mem::size_of::<$ty>())?;
			self.buf_mut().$name()
		}
	}
}

/// The typed read surface over a buffered stream.
pub trait BufSource<P: Pool = SharedPool>: BufStream<P> + Source {
	/// Reads up to `byte_count` bytes into the buffer, returning whether the
	/// requested count is available. To fail with end-of-input instead, use
	/// [`require`](Self::require).
	fn request(&mut self, byte_count: usize) -> Result<bool>;

	/// Reads at least `byte_count` bytes into the buffer, failing with
	/// end-of-input if the source exhausts first.
	fn require(&mut self, byte_count: usize) -> Result {
		if self.request(byte_count)? {
			Ok(())
		} else {
			Err(Error::eof(BufRead))
		}
	}

	/// Returns `true` if no more bytes can be read.
	fn exhausted(&mut self) -> Result<bool> {
		Ok(!self.request(1)?)
	}

	gen_int_reads! {
		read_i8 -> i8,
		read_u8 -> u8,
		read_i16 read_i16_le -> i16,
		read_u16 read_u16_le -> u16,
		read_i32 read_i32_le -> i32,
		read_u32 read_u32_le -> u32,
		read_i64 read_i64_le -> i64,
		read_u64 read_u64_le -> u64,
		read_isize read_isize_le -> isize,
		read_usize read_usize_le -> usize,
	}

	/// Removes up to `byte_count` bytes from the source, returning the count
	/// skipped.
	fn skip(&mut self, mut byte_count: usize) -> Result<usize> {
		let mut n = 0;
		while byte_count > 0 {
			if self.buf().is_empty() && !self.request(min(byte_count, SIZE))? {
				break
			}
			let skipped = self.buf_mut().skip(byte_count)?;
			if skipped == 0 { break }
			n += skipped;
			byte_count -= skipped;
		}
		Ok(n)
	}

	/// Reads bytes into a slice, returning the number of bytes read.
	fn read_into_slice(&mut self, mut dst: &mut [u8]) -> Result<usize> {
		let mut n = 0;
		while !dst.is_empty() {
			if self.buf().is_empty() && !self.request(min(dst.len(), SIZE))? {
				break
			}
			let read = self.buf_mut().read_into_slice(dst)?;
			n += read;
			dst = &mut dst[read..];
		}
		Ok(n)
	}

	/// Reads the exact length of bytes into a slice, failing with
	/// end-of-input if the slice cannot be filled. Buffered bytes are not
	/// consumed on failure.
	fn read_into_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		self.buf_mut().read_into_slice_exact(dst)
	}

	fn read_array<const K: usize>(&mut self) -> Result<[u8; K]> {
		let mut array = [0; K];
		self.read_into_slice_exact(&mut array)?;
		Ok(array)
	}

	/// Reads up to `byte_count` bytes into an owned [`ByteString`].
	fn read_byte_string(&mut self, byte_count: usize) -> Result<ByteString> {
		self.request(byte_count)?;
		self.buf_mut().read_byte_string(byte_count)
	}

	/// Reads at most `byte_count` bytes from the source, decoding them into
	/// `str` as UTF-8. Returns the number of bytes read.
	fn read_utf8(&mut self, str: &mut String, mut byte_count: usize) -> Result<usize> {
		let mut n = 0;
		while byte_count > 0 {
			if self.buf().is_empty() && !self.request(min(byte_count, SIZE))? {
				break
			}
			let len = min(byte_count, self.buf().count());
			let read = self.buf_mut().read_utf8(str, len)?;
			if read == 0 { break }
			n += read;
			byte_count -= read;
		}
		Ok(n)
	}

	/// Reads all bytes from the source, decoding them into `str` as UTF-8.
	fn read_all_utf8(&mut self, str: &mut String) -> Result<usize> {
		self.read_utf8(str, usize::MAX)
	}

	/// Reads UTF-8 text into `str` until a line terminator (`\n` or `\r\n`,
	/// consumed but excluded), returning whether one was found. At end of
	/// input the remaining bytes are the final line.
	fn read_utf8_line(&mut self, str: &mut String) -> Result<bool> {
		match self.find_line_terminator(usize::MAX)? {
			Some(at) => {
				self.buf_mut().read_line_at(str, at)?;
				Ok(true)
			}
			None => {
				self.read_all_utf8(str)?;
				Ok(false)
			}
		}
	}

	/// Like [`read_utf8_line`], but fails with end-of-input when the source
	/// exhausts before a terminator, and with invalid-input when no
	/// terminator appears within `limit` bytes of content.
	///
	/// [`read_utf8_line`]: Self::read_utf8_line
	fn read_utf8_line_strict(&mut self, str: &mut String, limit: usize) -> Result {
		match self.find_line_terminator(limit)? {
			Some(at) => self.buf_mut().read_line_at(str, at),
			None if self.buf().count() > limit => Err(Error::invalid_input(
				BufRead,
				"no line terminator within the limit",
			)),
			None => Err(Error::eof(BufRead)),
		}
	}

	/// Finds the next `\n` within `limit + 1` bytes, pulling from the source
	/// as needed without consuming.
	#[doc(hidden)]
	fn find_line_terminator(&mut self, limit: usize) -> Result<Option<usize>> {
		let bound = limit.saturating_add(1);
		let mut from = 0;
		loop {
			let count = self.buf().count();
			let to = min(count, bound);
			if let Some(i) = self.buf().find_byte(b'\n', from, to) {
				return Ok(Some(i))
			}
			if count > limit {
				return Ok(None)
			}
			from = count;
			if !self.request(count + 1)? {
				return Ok(None)
			}
		}
	}

	/// Finds the least index holding `byte`, pulling from the source as
	/// needed without consuming.
	fn index_of(&mut self, byte: u8) -> Result<Option<usize>> {
		let mut from = 0;
		loop {
			let count = self.buf().count();
			if let Some(i) = self.buf().find_byte(byte, from, count) {
				return Ok(Some(i))
			}
			from = count;
			if !self.request(count + 1)? {
				return Ok(None)
			}
		}
	}

	/// Reads one UTF-8 code point. Malformed input yields `U+FFFD` and
	/// consumes one byte; a well-formed prefix cut off by end of input fails
	/// without consuming.
	fn read_utf8_code_point(&mut self) -> Result<char> {
		self.require(1)?;
		// Pull the full width before decoding so a continuation split
		// across a refill is not mistaken for end of input.
		let width = match self.buf().peek_byte() {
			Some(0xC2..=0xDF) => 2,
			Some(0xE0..=0xEF) => 3,
			Some(0xF0..=0xF4) => 4,
			_ => 1,
		};
		if width > 1 {
			self.request(width)?;
		}
		self.buf_mut().read_utf8_code_point()
	}

	/// Reads a signed decimal from the source, stopping at the first
	/// non-digit. Fails with invalid-input on overflow past `i64` or when no
	/// digits are present.
	fn read_decimal_i64(&mut self) -> Result<i64> {
		self.require(1)?;
		self.buffer_through_literal(|i, b| b.is_ascii_digit() || (i == 0 && b == b'-'))?;
		self.buf_mut().read_decimal_i64()
	}

	/// Reads an unsigned hexadecimal from the source, stopping at the first
	/// non-digit. Fails with invalid-input past 16 significant digits or
	/// when no digits are present.
	fn read_hex_u64(&mut self) -> Result<u64> {
		self.require(1)?;
		self.buffer_through_literal(|_, b| b.is_ascii_hexdigit())?;
		self.buf_mut().read_hex_u64()
	}

	/// Pulls from the source until the buffer holds a byte outside the
	/// literal (per `is_part`) or the source exhausts, so the buffer-level
	/// parse sees the whole literal.
	#[doc(hidden)]
	fn buffer_through_literal(&mut self, is_part: impl Fn(usize, u8) -> bool) -> Result {
		let mut scanned = 0;
		loop {
			let count = self.buf().count();
			let terminated = self.buf()
				.chunks()
				.flatten()
				.enumerate()
				.skip(scanned)
				.any(|(i, &b)| !is_part(i, b));
			if terminated {
				return Ok(())
			}
			scanned = count;
			if !self.request(count + 1)? {
				return Ok(())
			}
		}
	}

	/// Drains the entire source into `sink`, returning the total bytes
	/// moved.
	fn transfer_to(&mut self, sink: &mut impl Sink) -> Result<usize> {
		let mut total = 0;
		loop {
			if self.buf().is_empty() && !self.request(SIZE)? {
				break
			}
			let count = self.buf().count();
			sink.write(self.buf_mut(), count)?;
			total += count;
		}
		Ok(total)
	}
}

macro_rules! gen_int_writes {
	($($be_name:ident $($le_name:ident)? -> $ty:ident,)+) => {
		$(gen_int_writes! { $be_name $($le_name)? -> $ty })+
	};
	($be_name:ident $le_name:ident -> $ty:ident) => {
		gen_int_writes! { $be_name -> $ty "big-endian " }
		gen_int_writes! { $le_name -> $ty "little-endian " }
	};
	($name:ident -> $ty:ident $($endian:literal)?) => {
		#[doc = concat!("Writes one ", $($endian,)? "[`", stringify!($ty), "`] to the sink.")]
		fn $name(&mut self, value: $ty) -> Result {
			self.check_writable()?;
			self.buf_mut().$name(value)
		}
	}
}

/// The typed write surface over a buffered stream.
pub trait BufSink<P: Pool = SharedPool>: BufStream<P> + Sink {
	/// Fails when the sink can no longer accept writes, before any bytes
	/// are buffered. Terminal buffers always accept.
	fn check_writable(&self) -> Result { Ok(()) }

	/// Writes buffered complete segments downstream, leaving the pending
	/// tail in place. A no-op for terminal buffers.
	fn emit(&mut self) -> Result { Ok(()) }

	/// Writes everything read from `source` into the sink, returning the
	/// total bytes moved.
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		self.check_writable()?;
		let mut total = 0;
		loop {
			match source.read(self.buf_mut(), SIZE)? {
				0 => break,
				n => total += n,
			}
			self.emit()?;
		}
		Ok(total)
	}

	gen_int_writes! {
		write_i8 -> i8,
		write_u8 -> u8,
		write_i16 write_i16_le -> i16,
		write_u16 write_u16_le -> u16,
		write_i32 write_i32_le -> i32,
		write_u32 write_u32_le -> u32,
		write_i64 write_i64_le -> i64,
		write_u64 write_u64_le -> u64,
		write_isize write_isize_le -> isize,
		write_usize write_usize_le -> usize,
	}

	fn write_from_slice(&mut self, value: &[u8]) -> Result {
		self.check_writable()?;
		self.buf_mut().write_from_slice(value)
	}

	fn write_utf8(&mut self, value: &str) -> Result {
		self.check_writable()?;
		self.buf_mut().write_utf8(value)
	}

	/// Writes one code point, encoding unpaired surrogates per the buffer's
	/// replacement policy.
	fn write_utf8_code_point(&mut self, code_point: u32) -> Result {
		self.check_writable()?;
		self.buf_mut().write_utf8_code_point(code_point)
	}

	/// Writes `value` as signed decimal text.
	fn write_decimal_i64(&mut self, value: i64) -> Result {
		self.check_writable()?;
		self.buf_mut().write_decimal_i64(value)
	}

	/// Writes `value` as lowercase hexadecimal text without a leading `0x`.
	fn write_hex_u64(&mut self, value: u64) -> Result {
		self.check_writable()?;
		self.buf_mut().write_hex_u64(value)
	}

	fn write_byte_string(&mut self, value: &ByteString) -> Result {
		self.write_from_slice(value.as_slice())
	}

	fn write_snapshot(&mut self, value: &Snapshot) -> Result {
		for chunk in value.chunks() {
			self.write_from_slice(chunk)?;
		}
		Ok(())
	}
}

/// A UTF-8 validation failure offset to the position of the decoded range
/// within the stream operation that found it.
#[derive(Copy, Clone, Debug)]
pub struct OffsetUtf8Error {
	inner: Utf8Error,
	offset: usize,
}

impl OffsetUtf8Error {
	pub(crate) fn new(inner: Utf8Error, offset: usize) -> Self {
		Self { inner, offset }
	}

	pub fn into_inner(self) -> Utf8Error { self.inner }

	pub fn valid_up_to(&self) -> usize {
		self.offset + self.inner.valid_up_to()
	}

	pub fn error_len(&self) -> Option<usize> {
		self.inner.error_len()
	}
}

impl Display for OffsetUtf8Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if let Some(error_len) = self.error_len() {
			write!(
				f,
				"invalid utf-8 sequence of {error_len} bytes from index {}",
				self.valid_up_to()
			)
		} else {
			write!(
				f,
				"incomplete utf-8 byte sequence from index {}",
				self.valid_up_to()
			)
		}
	}
}

impl StdError for OffsetUtf8Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		Some(&self.inner)
	}
}

// Impls

impl Stream for &[u8] { }

impl Source for &[u8] {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, mut count: usize) -> Result<usize> {
		count = min(count, self.len());
		sink.write_from_slice(&self[..count])
			.map_err(|err| err.with_op(BufRead))?;
		*self = &self[count..];
		Ok(count)
	}
}

impl Stream for Vec<u8> { }

impl Sink for Vec<u8> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if source.count() < count {
			return Err(Error::eof(BufWrite))
		}
		self.reserve(count);
		source.read_segments(count, |chunk| {
			self.extend_from_slice(chunk);
			Ok(chunk.len())
		})
	}
}
