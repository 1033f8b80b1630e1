// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use segio::{Buffer, SIZE};
use segio::streams::{BufSource, Sink, Source};

fn filled(runs: &[(u8, usize)]) -> (Buffer, Vec<u8>) {
	let mut buf = Buffer::default();
	let mut expected = Vec::new();
	for &(byte, count) in runs {
		let run = vec![byte; count];
		buf.write_from_slice(&run).unwrap();
		expected.extend_from_slice(&run);
	}
	(buf, expected)
}

#[quickcheck]
fn write_then_read_round_trips(data: Vec<u8>) {
	let mut buf = Buffer::default();
	buf.write_from_slice(&data).unwrap();
	assert_eq!(buf.count(), data.len());

	let mut out = vec![0; data.len()];
	buf.read_into_slice_exact(&mut out).unwrap();
	assert_eq!(out, data);
	assert!(buf.is_empty());
}

#[quickcheck]
fn transfer_between_buffers_preserves_bytes(data: Vec<u8>, take: usize) {
	let mut src = Buffer::default();
	src.write_from_slice(&data).unwrap();

	let take = if data.is_empty() { 0 } else { take % data.len() };
	let mut dst = Buffer::default();
	let moved = src.read(&mut dst, take).unwrap();
	assert_eq!(moved, take);
	assert_eq!(dst.count(), take);
	assert_eq!(src.count(), data.len() - take);

	let head = dst.read_byte_string(take).unwrap();
	assert_eq!(head.as_slice(), &data[..take]);
}

#[test]
fn staggered_runs_read_back_exactly() {
	let (mut buf, expected) = filled(&[
		(b'a', 1000),
		(b'b', 2500),
		(b'c', 5000),
		(b'd', 10_000),
		(b'e', 25_000),
		(b'f', 50_000),
	]);
	assert_eq!(buf.count(), expected.len());

	let mut offset = 0;
	for take in [999, 2502, 4998, 10_002, 24_998, 50_001] {
		let piece = buf.read_byte_string(take).unwrap();
		assert_eq!(piece.len(), take);
		assert_eq!(piece.as_slice(), &expected[offset..offset + take]);
		offset += take;
	}
	assert_eq!(buf.count(), 0);
}

#[test]
fn find_byte_across_segment_boundaries() {
	let (buf, _) = filled(&[(b'a', 1), (b'b', SIZE), (b'c', 1)]);
	let count = buf.count();

	assert_eq!(buf.find_byte(b'a', 1, count), None);
	assert_eq!(buf.find_byte(b'b', 15, count), Some(15));
	assert_eq!(buf.find_byte(b'c', 0, count), Some(SIZE + 1));
}

#[test]
fn find_byte_windows_around_a_marker() {
	let total = 5 * SIZE;
	for p in [0, 1, SIZE - 1, SIZE, 2 * SIZE + 5, total - 1] {
		let (mut buf, _) = filled(&[(b'a', total)]);
		{
			let mut cursor = buf.cursor_mut();
			cursor.seek(p as i64).unwrap();
			cursor.data_mut().unwrap().unwrap()[0] = b'c';
		}

		let windows = [
			(0, total),
			(p.saturating_sub(1), (p + 1).min(total)),
			(p, p + 1),
			(0, p),
			(p + 1, total),
			(p.saturating_sub(100), (p + 100).min(total)),
		];
		for (lo, hi) in windows {
			let expected = (lo <= p && p < hi).then_some(p);
			assert_eq!(
				buf.find_byte(b'c', lo, hi),
				expected,
				"window {lo}..{hi} around {p}",
			);
		}
	}
}

#[quickcheck]
fn find_byte_matches_naive_scan(data: Vec<u8>, byte: u8, from: usize, to: usize) -> bool {
	let mut buf = Buffer::default();
	buf.write_from_slice(&data).unwrap();

	let to = to.min(data.len());
	let naive = data.iter()
		.enumerate()
		.skip(from)
		.take(to.saturating_sub(from))
		.find(|&(_, &b)| b == byte)
		.map(|(i, _)| i);
	buf.find_byte(byte, from, to) == naive
}

#[quickcheck]
fn find_slice_matches_naive_scan(data: Vec<u8>, needle: Vec<u8>, from: usize) -> bool {
	let mut buf = Buffer::default();
	buf.write_from_slice(&data).unwrap();
	let from = from % (data.len() + 1);

	let naive = if needle.is_empty() {
		Some(from)
	} else {
		(from..data.len().saturating_sub(needle.len() - 1))
			.find(|&i| data[i..i + needle.len()] == needle[..])
	};
	buf.find_slice(&needle, from) == naive
}

#[test]
fn find_slice_straddling_a_boundary() {
	// The first run fills a whole segment, so the match spans two.
	let (buf, _) = filled(&[(b'x', SIZE), (b'y', 10)]);
	assert_eq!(buf.find_slice(b"xxyy", 0), Some(SIZE - 2));
	assert_eq!(buf.find_slice(b"yx", 0), None);
}

#[test]
fn copy_to_leaves_the_source_intact() {
	let (mut buf, expected) = filled(&[(b'm', 3000), (b'n', 3000)]);

	let mut dst = Buffer::default();
	buf.copy_to(&mut dst, 1000, 4000).unwrap();
	assert_eq!(dst.count(), 4000);

	let copied = dst.read_byte_string(4000).unwrap();
	assert_eq!(copied.as_slice(), &expected[1000..5000]);

	let all = buf.read_byte_string(6000).unwrap();
	assert_eq!(all.as_slice(), &expected[..]);
}

#[test]
fn transfer_to_empties_the_reader() {
	let (mut buf, expected) = filled(&[(b'q', 3 * SIZE + 17)]);
	let before = buf.count();

	let mut sink = Buffer::default();
	let moved = buf.transfer_to(&mut sink).unwrap();
	assert_eq!(moved, before);
	assert!(buf.is_empty());
	assert_eq!(sink.count(), expected.len());
}

#[test]
fn write_exact_count_from_source_buffer() {
	let (mut src, _) = filled(&[(b'z', 100)]);
	let mut dst = Buffer::default();

	assert_eq!(dst.write(&mut src, 40).unwrap(), 40);
	assert_eq!(src.count(), 60);
	assert_eq!(dst.count(), 40);

	// Asking for more than the source holds is refused.
	assert!(dst.write(&mut src, 61).is_err());
	assert_eq!(src.count(), 60);
}
