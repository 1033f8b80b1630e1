// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::io::Write;
use simdutf8::compat::from_utf8;
use crate::{Buffer, Error, Result, ResultExt};
use crate::error::{ErrorKind, Operation::BufRead};
use crate::byte_str::ByteString;
use crate::pool::Pool;
use crate::streams::{BufSource, BufStream, OffsetUtf8Error, Source};
use crate::utf8::{self, Decoded};

impl<P: Pool> Source for Buffer<P> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, mut count: usize) -> Result<usize> {
		count = min(count, self.count());
		let share_threshold = self.options().share_threshold;

		let mut read = 0;
		while read < count {
			let Some(mut seg) = self.segments.pop_front() else { break };
			if seg.is_empty() {
				self.pool.recycle_one(seg).context(BufRead)?;
				continue
			}

			let remaining = count - read;
			if seg.len() <= remaining {
				// Move full segments to the sink.
				read += seg.len();
				sink.push_moved(seg).context(BufRead)?;
			} else {
				// Split the last partial segment, sharing its page when the
				// prefix is large enough.
				let prefix = seg.split(remaining, share_threshold);
				read += prefix.len();
				sink.push_moved(prefix).context(BufRead)?;
				self.segments.push_front(seg);
			}
		}

		self.tidy().context(BufRead)?;
		sink.tidy().context(BufRead)?;
		Ok(read)
	}

	fn read_all(&mut self, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		let count = self.count();
		self.read(sink, count)
	}
}

impl<P: Pool> BufStream<P> for Buffer<P> {
	fn buf(&self) -> &Buffer<P> { self }
	fn buf_mut(&mut self) -> &mut Buffer<P> { self }
}

impl<P: Pool> BufSource<P> for Buffer<P> {
	/// A buffer is its own terminal source; requesting can never pull more
	/// bytes than it already holds.
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		Ok(self.count() >= byte_count)
	}
}

macro_rules! gen_int_reads {
	($($s_name:ident $s_le_name:ident $s_ty:ident | $u_name:ident $u_le_name:ident $u_ty:ident,)+) => { $(
		pub fn $s_name(&mut self) -> Result<$s_ty> {
			self.$u_name().map(|n| n as $s_ty)
		}

		pub fn $s_le_name(&mut self) -> Result<$s_ty> {
			self.$u_le_name().map(|n| n as $s_ty)
		}

		pub fn $u_name(&mut self) -> Result<$u_ty> {
			Ok($u_ty::from_be_bytes(self.read_array()?))
		}

		pub fn $u_le_name(&mut self) -> Result<$u_ty> {
			Ok($u_ty::from_le_bytes(self.read_array()?))
		}
	)+ }
}

impl<P: Pool> Buffer<P> {
	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|n| n as i8)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let byte = self.peek_byte().ok_or_else(|| Error::eof(BufRead))?;
		self.skip(1)?;
		Ok(byte)
	}

	gen_int_reads! {
		read_i16 read_i16_le i16 | read_u16 read_u16_le u16,
		read_i32 read_i32_le i32 | read_u32 read_u32_le u32,
		read_i64 read_i64_le i64 | read_u64 read_u64_le u64,
		read_isize read_isize_le isize | read_usize read_usize_le usize,
	}

	pub fn read_array<const K: usize>(&mut self) -> Result<[u8; K]> {
		let mut array = [0; K];
		self.read_into_slice_exact(&mut array)?;
		Ok(array)
	}

	/// Reads bytes into a slice, returning the number of bytes read.
	pub fn read_into_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		let n = min(dst.len(), self.count());
		self.read_into_slice_exact(&mut dst[..n])?;
		Ok(n)
	}

	/// Reads the exact length of bytes into a slice, failing with
	/// end-of-input (and consuming nothing) if the buffer holds fewer.
	pub fn read_into_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		if self.count() < dst.len() {
			return Err(Error::eof(BufRead))
		}

		let mut off = 0;
		self.read_segments(dst.len(), |chunk| {
			dst[off..off + chunk.len()].copy_from_slice(chunk);
			off += chunk.len();
			Ok(chunk.len())
		})?;
		Ok(())
	}

	/// Reads up to `byte_count` bytes into an owned [`ByteString`].
	pub fn read_byte_string(&mut self, byte_count: usize) -> Result<ByteString> {
		let len = min(byte_count, self.count());
		let mut data = Vec::with_capacity(len);
		self.read_segments(len, |chunk| {
			data.extend_from_slice(chunk);
			Ok(chunk.len())
		})?;
		Ok(data.into())
	}

	/// Reads exactly `byte_count` bytes (clamped to the buffer) into `str`,
	/// validating them as UTF-8. Nothing is consumed on validation failure.
	pub fn read_utf8(&mut self, str: &mut String, byte_count: usize) -> Result<usize> {
		let len = min(byte_count, self.count());
		if len == 0 {
			return Ok(0)
		}

		// The contiguous case borrows straight from the front segment.
		let front_len = self.segments.front().map_or(0, |seg| seg.len());
		if front_len >= len {
			let front = self.segments.front()
				.expect("a non-empty front segment was just measured");
			let utf8 = validated(&front.data()[..len], 0)?;
			str.push_str(utf8);
		} else {
			let mut data = Vec::with_capacity(len);
			for chunk in self.chunks() {
				let take = min(len - data.len(), chunk.len());
				data.extend_from_slice(&chunk[..take]);
				if data.len() == len { break }
			}
			str.push_str(validated(&data, 0)?);
		}

		self.skip(len)?;
		Ok(len)
	}

	/// Reads all bytes as UTF-8 into `str`.
	pub fn read_all_utf8(&mut self, str: &mut String) -> Result<usize> {
		let count = self.count();
		self.read_utf8(str, count)
	}

	/// Reads the line whose `\n` terminator sits at index `terminator` into
	/// `str`, consuming the terminator (and a preceding `\r`) but excluding
	/// it from the text.
	pub fn read_line_at(&mut self, str: &mut String, terminator: usize) -> Result {
		let crlf = terminator > 0 && self.get(terminator - 1) == Some(b'\r');
		let content = if crlf { terminator - 1 } else { terminator };
		self.read_utf8(str, content)?;
		self.skip(if crlf { 2 } else { 1 })?;
		Ok(())
	}

	/// Reads one UTF-8 code point. Malformed input yields `U+FFFD` and
	/// consumes exactly the leading byte; a well-formed prefix cut off by
	/// the end of the buffer fails without consuming.
	pub fn read_utf8_code_point(&mut self) -> Result<char> {
		let mut window = [0; 4];
		let mut len = 0;
		while len < 4 {
			match self.get(len) {
				Some(b) => {
					window[len] = b;
					len += 1;
				}
				None => break,
			}
		}
		if len == 0 {
			return Err(Error::eof(BufRead))
		}

		match utf8::decode_code_point(&window[..len]) {
			Decoded::Valid(c, size) => {
				self.skip(size)?;
				Ok(c)
			}
			Decoded::Malformed => {
				self.skip(1)?;
				Ok(utf8::REPLACEMENT)
			}
			Decoded::Truncated => Err(Error::eof(BufRead)),
		}
	}

	/// Reads a signed decimal, stopping at the first non-digit. A `-` is
	/// only recognized at the start. Fails with invalid-input on overflow
	/// past the `i64` range or when no digits are present; nothing is
	/// consumed on failure.
	pub fn read_decimal_i64(&mut self) -> Result<i64> {
		const OVERFLOW: &str = "decimal overflows a signed 64-bit integer";

		let negative = self.peek_byte() == Some(b'-');
		let mut i = usize::from(negative);
		// Accumulate negated so `i64::MIN` parses without tripping the
		// magnitude check.
		let mut value: i64 = 0;
		let mut digits = 0;

		while let Some(b @ b'0'..=b'9') = self.get(i) {
			let digit = i64::from(b - b'0');
			value = value.checked_mul(10)
				.and_then(|v| v.checked_sub(digit))
				.ok_or_else(|| Error::invalid_input(BufRead, OVERFLOW))?;
			digits += 1;
			i += 1;
		}

		if digits == 0 {
			return Err(if self.is_empty() {
				Error::eof(BufRead)
			} else {
				Error::invalid_input(BufRead, "expected a decimal digit")
			})
		}

		let value = if negative {
			value
		} else {
			value.checked_neg()
				.ok_or_else(|| Error::invalid_input(BufRead, OVERFLOW))?
		};
		self.skip(i)?;
		Ok(value)
	}

	/// Reads an unsigned hexadecimal, stopping at the first non-digit. Fails
	/// with invalid-input past 16 significant digits or when no digits are
	/// present; nothing is consumed on failure.
	pub fn read_hex_u64(&mut self) -> Result<u64> {
		let mut i = 0;
		let mut value: u64 = 0;
		let mut digits = 0;

		while let Some(b) = self.get(i) {
			let digit = match b {
				b'0'..=b'9' => b - b'0',
				b'a'..=b'f' => b - b'a' + 10,
				b'A'..=b'F' => b - b'A' + 10,
				_ => break,
			};
			if value & 0xF000_0000_0000_0000 != 0 {
				return Err(Error::invalid_input(
					BufRead,
					"hexadecimal overflows an unsigned 64-bit integer",
				))
			}
			value = value << 4 | u64::from(digit);
			digits += 1;
			i += 1;
		}

		if digits == 0 {
			return Err(if self.is_empty() {
				Error::eof(BufRead)
			} else {
				Error::invalid_input(BufRead, "expected a hexadecimal digit")
			})
		}

		self.skip(i)?;
		Ok(value)
	}

	pub(crate) fn read_std<W: Write>(&mut self, writer: &mut W, count: usize) -> Result<usize> {
		self.read_segments(count, |chunk| Ok(writer.write(chunk)?))
	}
}

fn validated(bytes: &[u8], offset: usize) -> Result<&str> {
	from_utf8(bytes).map_err(|err| Error::new(
		BufRead,
		ErrorKind::InvalidInput,
		Some(OffsetUtf8Error::new(err, offset).into()),
	))
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::Buffer;
	use crate::error::ErrorKind;

	#[test]
	fn decimal_min_then_literal() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"-9223372036854775808zzz").unwrap();

		assert_eq!(buf.read_decimal_i64().unwrap(), i64::MIN);
		let mut rest = String::new();
		buf.read_all_utf8(&mut rest).unwrap();
		assert_eq!(rest, "zzz");
	}

	#[test]
	fn decimal_overflow_is_invalid() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"9223372036854775808").unwrap();
		assert_eq!(buf.read_decimal_i64().unwrap_err().kind, ErrorKind::InvalidInput);

		let mut buf = Buffer::default();
		buf.write_from_slice(b"-9223372036854775809").unwrap();
		assert_eq!(buf.read_decimal_i64().unwrap_err().kind, ErrorKind::InvalidInput);
	}

	#[test]
	fn decimal_stops_at_first_non_digit() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"123-456").unwrap();
		assert_eq!(buf.read_decimal_i64().unwrap(), 123);
		assert_eq!(buf.count(), 4);
	}

	#[test]
	fn hex_rejects_seventeen_significant_digits() {
		let mut buf = Buffer::default();
		buf.write_from_slice(b"fedcba9876543210f").unwrap();
		assert_eq!(buf.read_hex_u64().unwrap_err().kind, ErrorKind::InvalidInput);

		// Leading zeros are not significant.
		let mut buf = Buffer::default();
		buf.write_from_slice(b"000000000000000000ff").unwrap();
		assert_eq!(buf.read_hex_u64().unwrap(), 0xFF);
	}

	#[test]
	fn code_point_replacement_consumes_one_byte() {
		let mut buf = Buffer::default();
		buf.write_from_slice(&[0xE2, b'o', b'k']).unwrap();
		assert_eq!(buf.read_utf8_code_point().unwrap(), '\u{FFFD}');
		assert_eq!(buf.count(), 2);

		let mut truncated = Buffer::default();
		truncated.write_from_slice(&[0xE2, 0x82]).unwrap();
		let err = truncated.read_utf8_code_point().unwrap_err();
		assert_eq!(err.kind, ErrorKind::EndOfInput);
		assert_eq!(truncated.count(), 2);
	}
}
