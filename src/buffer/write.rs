// SPDX-License-Identifier: Apache-2.0

use std::cmp::min;
use std::io::Read;
use arrayvec::ArrayVec;
use crate::{Buffer, Error, Result, ResultExt};
use crate::error::Operation::BufWrite;
use crate::pool::Pool;
use crate::streams::{BufSink, Sink, Source};
use crate::utf8;

impl<P: Pool> Sink for Buffer<P> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if source.count() < count {
			return Err(Error::eof(BufWrite))
		}
		source.read(self, count).context(BufWrite)
	}
}

impl<P: Pool> BufSink<P> for Buffer<P> { }

macro_rules! gen_int_writes {
	($($name:ident $le_name:ident $ty:ident,)+) => { $(
		pub fn $name(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_be_bytes())
		}

		pub fn $le_name(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_le_bytes())
		}
	)+ }
}

impl<P: Pool> Buffer<P> {
	pub fn write_i8(&mut self, value: i8) -> Result {
		self.write_u8(value as u8)
	}

	pub fn write_u8(&mut self, value: u8) -> Result {
		self.write_segments(1, |space| {
			space[0] = value;
			Ok(1)
		})?;
		Ok(())
	}

	gen_int_writes! {
		write_i16 write_i16_le i16,
		write_u16 write_u16_le u16,
		write_i32 write_i32_le i32,
		write_u32 write_u32_le u32,
		write_i64 write_i64_le i64,
		write_u64 write_u64_le u64,
		write_isize write_isize_le isize,
		write_usize write_usize_le usize,
	}

	pub fn write_from_slice(&mut self, value: &[u8]) -> Result {
		let mut off = 0;
		self.write_segments(value.len(), |space| {
			let n = min(space.len(), value.len() - off);
			space[..n].copy_from_slice(&value[off..off + n]);
			off += n;
			Ok(n)
		})?;
		Ok(())
	}

	pub fn write_utf8(&mut self, value: &str) -> Result {
		self.write_from_slice(value.as_bytes())
	}

	/// Writes one code point as UTF-8. Unpaired surrogates encode per the
	/// buffer's replacement policy; code points past `U+10FFFF` fail with
	/// invalid-input.
	pub fn write_utf8_code_point(&mut self, code_point: u32) -> Result {
		let encoded = utf8::encode_code_point(code_point, self.options().utf8_replacement)?;
		self.write_from_slice(&encoded)
	}

	/// Writes `value` as signed decimal text.
	pub fn write_decimal_i64(&mut self, value: i64) -> Result {
		if value == 0 {
			return self.write_u8(b'0')
		}

		if value < 0 {
			self.write_u8(b'-')?;
		}

		let mut digits = ArrayVec::<u8, 20>::new();
		let mut magnitude = value.unsigned_abs();
		while magnitude > 0 {
			digits.push(b'0' + (magnitude % 10) as u8);
			magnitude /= 10;
		}
		digits.reverse();
		self.write_from_slice(&digits)
	}

	/// Writes `value` as lowercase hexadecimal text without a leading `0x`.
	pub fn write_hex_u64(&mut self, value: u64) -> Result {
		if value == 0 {
			return self.write_u8(b'0')
		}

		const DIGITS: &[u8; 16] = b"0123456789abcdef";
		let mut out = ArrayVec::<u8, 16>::new();
		let mut v = value;
		while v > 0 {
			out.push(DIGITS[(v & 0xF) as usize]);
			v >>= 4;
		}
		out.reverse();
		self.write_from_slice(&out)
	}

	/// Appends every byte `source` can produce, returning the total.
	pub fn write_all_from(&mut self, source: &mut impl Source) -> Result<usize> {
		source.read_all(self).context(BufWrite)
	}

	pub(crate) fn write_std<R: Read>(&mut self, reader: &mut R, count: usize) -> Result<usize> {
		self.write_segments(count, |space| Ok(reader.read(space)?))
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::Buffer;
	use crate::buffer::{BufferOptions, Utf8Replacement};
	use crate::pool::SharedPool;

	fn utf8_of(buf: &mut Buffer) -> String {
		let mut str = String::new();
		buf.read_all_utf8(&mut str).unwrap();
		str
	}

	#[test]
	fn decimal_text() {
		let mut buf = Buffer::default();
		buf.write_decimal_i64(0).unwrap();
		buf.write_decimal_i64(-42).unwrap();
		buf.write_decimal_i64(i64::MIN).unwrap();
		buf.write_decimal_i64(i64::MAX).unwrap();
		assert_eq!(
			utf8_of(&mut buf),
			"0-42-92233720368547758089223372036854775807",
		);
	}

	#[test]
	fn hex_text() {
		let mut buf = Buffer::default();
		buf.write_hex_u64(0).unwrap();
		buf.write_hex_u64(0xDEAD_BEEF).unwrap();
		buf.write_hex_u64(u64::MAX).unwrap();
		assert_eq!(utf8_of(&mut buf), "0deadbeefffffffffffffffff");
	}

	#[test]
	fn surrogate_write_policy() {
		let mut buf = Buffer::default();
		buf.write_utf8_code_point(0xD800).unwrap();
		assert_eq!(buf.read_u8().unwrap(), b'?');

		let mut canonical = Buffer::with_options(
			SharedPool::get(),
			BufferOptions::default()
				.set_utf8_replacement(Utf8Replacement::ReplacementChar),
		);
		canonical.write_utf8_code_point(0xDFFF).unwrap();
		assert_eq!(canonical.read_array::<3>().unwrap(), [0xEF, 0xBF, 0xBD]);
	}
}
