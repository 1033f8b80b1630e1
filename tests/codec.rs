// SPDX-License-Identifier: Apache-2.0

use paste::paste;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use segio::{Buffer, ByteString, ErrorKind, Utf8Replacement};
use segio::streams::BufSource;
use segio::utf8::size_of_code_points;

macro_rules! int_round_trips {
	($($ty:ident),+) => { paste! { $(
		#[quickcheck]
		fn [<$ty _round_trips_both_orders>](value: $ty) {
			let mut buf = Buffer::default();
			buf.[<write_ $ty>](value).unwrap();
			buf.[<write_ $ty _le>](value).unwrap();
			assert_eq!(buf.[<read_ $ty>]().unwrap(), value);
			assert_eq!(buf.[<read_ $ty _le>]().unwrap(), value);
			assert!(buf.is_empty());
		}
	)+ } }
}

int_round_trips! { i16, u16, i32, u32, i64, u64 }

#[quickcheck]
fn bytes_round_trip(a: u8, b: i8) {
	let mut buf = Buffer::default();
	buf.write_u8(a).unwrap();
	buf.write_i8(b).unwrap();
	assert_eq!(buf.read_u8().unwrap(), a);
	assert_eq!(buf.read_i8().unwrap(), b);
}

#[test]
fn ints_split_across_segments() {
	// Fill so the next u64 straddles a segment boundary.
	let mut buf = Buffer::default();
	buf.write_from_slice(&[0; segio::SIZE - 3]).unwrap();
	buf.write_u64(0x0102_0304_0506_0708).unwrap();
	buf.skip(segio::SIZE - 3).unwrap();
	assert_eq!(buf.read_u64().unwrap(), 0x0102_0304_0506_0708);
}

#[quickcheck]
fn decimal_text_round_trips(value: i64) {
	let mut buf = Buffer::default();
	buf.write_decimal_i64(value).unwrap();
	assert_eq!(buf.read_decimal_i64().unwrap(), value);
	assert!(buf.is_empty());
}

#[quickcheck]
fn hex_text_round_trips(value: u64) {
	let mut buf = Buffer::default();
	buf.write_hex_u64(value).unwrap();
	assert_eq!(buf.read_hex_u64().unwrap(), value);
	assert!(buf.is_empty());
}

#[test]
fn hex_accepts_both_cases() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"DeadBEEF").unwrap();
	assert_eq!(buf.read_hex_u64().unwrap(), 0xDEAD_BEEF);
}

#[quickcheck]
fn utf8_strings_round_trip(text: String) {
	let mut buf = Buffer::default();
	buf.write_utf8(&text).unwrap();
	assert_eq!(buf.count(), text.len());

	let mut out = String::new();
	buf.read_all_utf8(&mut out).unwrap();
	assert_eq!(out, text);
}

#[quickcheck]
fn code_points_round_trip(c: char) {
	let mut buf = Buffer::default();
	buf.write_utf8_code_point(c as u32).unwrap();
	assert_eq!(buf.count(), c.len_utf8());
	assert_eq!(buf.read_utf8_code_point().unwrap(), c);
}

#[test]
fn known_utf8_encoding_vector() {
	let text = "təˈranəˌsôr";
	let size = size_of_code_points(
		text.chars().map(u32::from),
		Utf8Replacement::QuestionMark,
	).unwrap();
	assert_eq!(size, 16);

	let mut buf = Buffer::default();
	buf.write_utf8(text).unwrap();
	let bytes = buf.read_byte_string(16).unwrap();
	assert_eq!(bytes.hex_lower(), "74c999cb8872616ec999cb8c73c3b472");
	assert_eq!(bytes, ByteString::from(text.as_bytes()));
}

#[test]
fn out_of_range_code_point_is_invalid_input() {
	let mut buf = Buffer::default();
	let err = buf.write_utf8_code_point(0x110000).unwrap_err();
	assert_eq!(err.kind, ErrorKind::InvalidInput);
	assert!(buf.is_empty());
}

#[test]
fn line_reads() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"unix\ndos\r\nlast").unwrap();

	let mut line = String::new();
	assert!(buf.read_utf8_line(&mut line).unwrap());
	assert_eq!(line, "unix");

	line.clear();
	assert!(buf.read_utf8_line(&mut line).unwrap());
	assert_eq!(line, "dos");

	line.clear();
	assert!(!buf.read_utf8_line(&mut line).unwrap());
	assert_eq!(line, "last");
}

#[test]
fn strict_line_reads_enforce_the_limit() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"tiny\n").unwrap();
	let mut line = String::new();
	buf.read_utf8_line_strict(&mut line, 10).unwrap();
	assert_eq!(line, "tiny");

	let mut long = Buffer::default();
	long.write_from_slice(b"an overlong line\n").unwrap();
	let err = long.read_utf8_line_strict(&mut String::new(), 4).unwrap_err();
	assert_eq!(err.kind, ErrorKind::InvalidInput);

	let mut unterminated = Buffer::default();
	unterminated.write_from_slice(b"no end").unwrap();
	let err = unterminated
		.read_utf8_line_strict(&mut String::new(), 100)
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::EndOfInput);
}
