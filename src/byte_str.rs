// SPDX-License-Identifier: Apache-2.0

//! Immutable byte-string values: the owned contiguous [`ByteString`], the
//! UTF-8 validated [`Utf8String`], and the segment-backed [`Snapshot`]
//! frozen out of a buffer. All three compare byte-by-byte regardless of
//! representation and render to hex and Base64; snapshots share segment
//! pages with the buffer they came from instead of copying.

use std::cmp::min;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Bound, RangeBounds};
use base64::Engine;
use base64::engine::GeneralPurpose;
use base64::prelude::{BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD};
use once_cell::sync::OnceCell;
use simdutf8::compat::{from_utf8, Utf8Error};
use crate::error::{Error, Operation, Result};
use crate::pool::Pool;
use crate::segment::{memory::Memory, Segment, SIZE};
use crate::streams::BufSink;

/// An owned, contiguous string of bytes.
#[derive(Clone, Default)]
pub struct ByteString {
	data: Vec<u8>,
	hash: OnceCell<u64>,
}

impl ByteString {
	/// Creates an empty byte string.
	pub fn empty() -> Self { Self::default() }

	/// Returns the length in bytes.
	pub fn len(&self) -> usize { self.data.len() }

	pub fn is_empty(&self) -> bool { self.data.is_empty() }

	/// Returns the byte at `index`, or `None` if `index` is out of bounds.
	pub fn get(&self, index: usize) -> Option<u8> {
		self.data.get(index).copied()
	}

	/// Returns the internal data as a slice of bytes.
	pub fn as_slice(&self) -> &[u8] { &self.data }

	/// Returns an owned copy of the sub-range `range`.
	pub fn substr(&self, range: impl RangeBounds<usize>) -> ByteString {
		let range = resolve(range, self.len());
		self.data[range].into()
	}

	/// Validates the bytes as UTF-8, returning a borrowed decode.
	pub fn utf8(&self) -> std::result::Result<&str, Utf8Error> {
		from_utf8(&self.data)
	}

	/// Validates the bytes as UTF-8 into a [`Utf8String`], caching the code
	/// point count and ASCII flag.
	pub fn decode_utf8(&self) -> Result<Utf8String> {
		Utf8String::from_bytes(self.data.clone())
	}

	/// Returns the cached content hash, computing it on first use.
	pub fn hash_code(&self) -> u64 {
		*self.hash.get_or_init(|| fnv1a(self.chunks()))
	}

	/// Encodes the data into a Base64 string.
	pub fn base64(&self) -> String {
		BASE64_STANDARD_NO_PAD.encode(&self.data)
	}

	/// Encodes the data into a URL-safe Base64 string.
	pub fn base64_url(&self) -> String {
		BASE64_URL_SAFE_NO_PAD.encode(&self.data)
	}

	/// Encodes the data into a lowercase hex string.
	pub fn hex_lower(&self) -> String {
		base16ct::lower::encode_string(&self.data)
	}

	/// Encodes the data into an uppercase hex string.
	pub fn hex_upper(&self) -> String {
		base16ct::upper::encode_string(&self.data)
	}

	/// Copies bytes starting at `offset` into `dst`, returning the count
	/// copied.
	pub fn copy_into_slice(&self, offset: usize, dst: &mut [u8]) -> usize {
		let Some(src) = self.data.get(offset..) else { return 0 };
		let n = min(src.len(), dst.len());
		dst[..n].copy_from_slice(&src[..n]);
		n
	}

	/// Writes the bytes to `sink`.
	pub fn write_to<P: Pool>(&self, sink: &mut impl BufSink<P>) -> Result {
		sink.write_from_slice(&self.data)
	}

	fn chunks(&self) -> impl Iterator<Item = &[u8]> {
		std::iter::once(self.data.as_slice())
	}
}

impl fmt::Debug for ByteString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ByteString[{}] {}", self.len(), hex_preview(self.chunks()))
	}
}

impl PartialEq for ByteString {
	fn eq(&self, other: &Self) -> bool {
		self.data == other.data
	}
}

impl Eq for ByteString { }

impl Hash for ByteString {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u64(self.hash_code());
	}
}

impl From<Vec<u8>> for ByteString {
	fn from(data: Vec<u8>) -> Self {
		Self { data, hash: OnceCell::new() }
	}
}

impl From<&[u8]> for ByteString {
	fn from(value: &[u8]) -> Self {
		value.to_vec().into()
	}
}

impl FromIterator<u8> for ByteString {
	fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
		iter.into_iter().collect::<Vec<_>>().into()
	}
}

impl AsRef<[u8]> for ByteString {
	fn as_ref(&self) -> &[u8] { &self.data }
}

/// An owned byte string validated as UTF-8 at construction, carrying a
/// cached code point count and ASCII flag.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Utf8String {
	data: String,
	char_count: usize,
	ascii: bool,
}

impl Utf8String {
	/// Validates `bytes` as UTF-8.
	pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
		from_utf8(&bytes).map_err(|_| Error::invalid_input(
			Operation::Unknown,
			"the bytes should be valid UTF-8",
		))?;
		let data = String::from_utf8(bytes)
			.expect("the bytes were just validated");
		Ok(data.into())
	}

	pub fn as_str(&self) -> &str { &self.data }

	pub fn as_bytes(&self) -> &[u8] { self.data.as_bytes() }

	/// Returns the length in bytes.
	pub fn len(&self) -> usize { self.data.len() }

	pub fn is_empty(&self) -> bool { self.data.is_empty() }

	/// Returns the cached number of code points.
	pub fn char_count(&self) -> usize { self.char_count }

	/// Returns `true` if every code point is ASCII, cached at construction.
	pub fn is_ascii(&self) -> bool { self.ascii }

	/// Returns the byte at `index`, or `None` if `index` is out of bounds.
	pub fn get(&self, index: usize) -> Option<u8> {
		self.data.as_bytes().get(index).copied()
	}

	pub fn to_byte_string(&self) -> ByteString {
		self.data.as_bytes().into()
	}

	/// Returns an owned copy of the byte sub-range `range`, which need not
	/// fall on character boundaries.
	pub fn substr(&self, range: impl RangeBounds<usize>) -> ByteString {
		self.to_byte_string().substr(range)
	}

	/// Encodes the bytes into a Base64 string.
	pub fn base64(&self) -> String {
		BASE64_STANDARD_NO_PAD.encode(self.as_bytes())
	}

	/// Encodes the bytes into a URL-safe Base64 string.
	pub fn base64_url(&self) -> String {
		BASE64_URL_SAFE_NO_PAD.encode(self.as_bytes())
	}

	/// Encodes the bytes into a lowercase hex string.
	pub fn hex_lower(&self) -> String {
		base16ct::lower::encode_string(self.as_bytes())
	}

	/// Encodes the bytes into an uppercase hex string.
	pub fn hex_upper(&self) -> String {
		base16ct::upper::encode_string(self.as_bytes())
	}

	/// Copies bytes starting at `offset` into `dst`, returning the count
	/// copied.
	pub fn copy_into_slice(&self, offset: usize, dst: &mut [u8]) -> usize {
		let Some(src) = self.as_bytes().get(offset..) else { return 0 };
		let n = min(src.len(), dst.len());
		dst[..n].copy_from_slice(&src[..n]);
		n
	}

	/// Writes the bytes to `sink`.
	pub fn write_to<P: Pool>(&self, sink: &mut impl BufSink<P>) -> Result {
		sink.write_utf8(&self.data)
	}

	pub fn into_string(self) -> String { self.data }
}

impl From<String> for Utf8String {
	fn from(data: String) -> Self {
		Self {
			char_count: data.chars().count(),
			ascii: data.is_ascii(),
			data,
		}
	}
}

impl From<&str> for Utf8String {
	fn from(value: &str) -> Self {
		value.to_owned().into()
	}
}

impl PartialEq<ByteString> for Utf8String {
	fn eq(&self, other: &ByteString) -> bool {
		self.as_bytes() == other.as_slice()
	}
}

impl PartialEq<Utf8String> for ByteString {
	fn eq(&self, other: &Utf8String) -> bool {
		other == self
	}
}

/// An immutable view over a buffer's contents at a point in time, sharing
/// the buffer's segment pages. The buffer is free to mutate afterwards;
/// shared pages copy on write, so the frozen ranges never change. A
/// dropped snapshot releases its pages directly rather than recycling them
/// through the pool.
///
/// A directory of cumulative end offsets gives `O(log k)` random access
/// over `k` segments.
#[derive(Clone, Default)]
pub struct Snapshot {
	memories: Vec<Memory<SIZE>>,
	/// `directory[i]` is the absolute offset at which memory `i` ends.
	directory: Vec<usize>,
	hash: OnceCell<u64>,
}

impl Snapshot {
	pub(crate) fn over_segments<'a>(
		segments: impl Iterator<Item = &'a Segment<SIZE>>,
	) -> Self {
		let memories: Vec<_> = segments
			.filter(|seg| !seg.is_empty())
			.map(|seg| seg.memory().share_all())
			.collect();
		let directory = memories.iter()
			.scan(0, |end, mem| {
				*end += mem.len();
				Some(*end)
			})
			.collect();
		Self {
			memories,
			directory,
			hash: OnceCell::new(),
		}
	}

	/// Returns the length in bytes.
	pub fn len(&self) -> usize {
		self.directory.last().copied().unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.directory.is_empty()
	}

	/// Returns the byte at `index` in `O(log k)` over `k` segments, or
	/// `None` if `index` is out of bounds.
	pub fn get(&self, index: usize) -> Option<u8> {
		if index >= self.len() {
			return None
		}
		let seg = self.directory.partition_point(|&end| end <= index);
		let start = if seg == 0 { 0 } else { self.directory[seg - 1] };
		Some(self.memories[seg].data()[index - start])
	}

	/// Returns the frozen ranges in order.
	pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
		self.memories.iter().map(Memory::data)
	}

	/// Returns a snapshot of the sub-range `range`, sharing the same pages.
	pub fn substr(&self, range: impl RangeBounds<usize>) -> Snapshot {
		let range = resolve(range, self.len());
		let mut memories = Vec::new();
		let mut start = 0;
		for mem in &self.memories {
			let end = start + mem.len();
			if end > range.start && start < range.end {
				let lo = range.start.saturating_sub(start);
				let hi = min(range.end - start, mem.len());
				memories.push(mem.share_range(lo, hi));
			}
			start = end;
		}
		let directory = memories.iter()
			.scan(0, |end, mem| {
				*end += mem.len();
				Some(*end)
			})
			.collect();
		Self {
			memories,
			directory,
			hash: OnceCell::new(),
		}
	}

	/// Flattens the snapshot into an owned [`ByteString`].
	pub fn to_byte_string(&self) -> ByteString {
		self.to_vec().into()
	}

	pub fn to_vec(&self) -> Vec<u8> {
		let mut data = Vec::with_capacity(self.len());
		for chunk in self.chunks() {
			data.extend_from_slice(chunk);
		}
		data
	}

	/// Decodes the bytes as UTF-8.
	pub fn utf8(&self) -> Result<String> {
		let data = self.to_vec();
		from_utf8(&data).map_err(|_| Error::invalid_input(
			Operation::Unknown,
			"the bytes should be valid UTF-8",
		))?;
		Ok(String::from_utf8(data).expect("the bytes were just validated"))
	}

	/// Returns the cached content hash, computing it on first use.
	pub fn hash_code(&self) -> u64 {
		*self.hash.get_or_init(|| fnv1a(self.chunks()))
	}

	/// Encodes the data into a Base64 string. Segmented data encodes the
	/// same as its contiguous equivalent.
	pub fn base64(&self) -> String {
		self.encode_rolling(&BASE64_STANDARD_NO_PAD)
	}

	/// Encodes the data into a URL-safe Base64 string.
	pub fn base64_url(&self) -> String {
		self.encode_rolling(&BASE64_URL_SAFE_NO_PAD)
	}

	/// Encodes the data into a lowercase hex string.
	pub fn hex_lower(&self) -> String {
		self.chunks().map(base16ct::lower::encode_string).collect()
	}

	/// Encodes the data into an uppercase hex string.
	pub fn hex_upper(&self) -> String {
		self.chunks().map(base16ct::upper::encode_string).collect()
	}

	/// Copies bytes starting at `offset` into `dst`, returning the count
	/// copied.
	pub fn copy_into_slice(&self, offset: usize, dst: &mut [u8]) -> usize {
		let mut copied = 0;
		let mut start = 0;
		for chunk in self.chunks() {
			let end = start + chunk.len();
			if end > offset && copied < dst.len() {
				let src = &chunk[offset.saturating_sub(start)..];
				let n = min(src.len(), dst.len() - copied);
				dst[copied..copied + n].copy_from_slice(&src[..n]);
				copied += n;
			}
			start = end;
		}
		copied
	}

	/// Writes the bytes to `sink`.
	pub fn write_to<P: Pool>(&self, sink: &mut impl BufSink<P>) -> Result {
		for chunk in self.chunks() {
			sink.write_from_slice(chunk)?;
		}
		Ok(())
	}

	/// Base64 encodes a multiple of three bytes per step, rolling the
	/// remainder into the next chunk so segment boundaries cannot change
	/// the output.
	fn encode_rolling(&self, engine: &GeneralPurpose) -> String {
		let mut dst = String::new();
		let mut rem: Vec<u8> = Vec::with_capacity(3);
		for mut chunk in self.chunks() {
			if !rem.is_empty() {
				let take = min(3 - rem.len(), chunk.len());
				rem.extend_from_slice(&chunk[..take]);
				chunk = &chunk[take..];
				if rem.len() == 3 {
					engine.encode_string(&rem, &mut dst);
					rem.clear();
				}
			}
			let clean = chunk.len() / 3 * 3;
			engine.encode_string(&chunk[..clean], &mut dst);
			rem.extend_from_slice(&chunk[clean..]);
		}
		engine.encode_string(&rem, &mut dst);
		dst
	}
}

impl fmt::Debug for Snapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Snapshot[{}; {} segments] {}",
			self.len(),
			self.memories.len(),
			hex_preview(self.chunks()),
		)
	}
}

impl PartialEq for Snapshot {
	fn eq(&self, other: &Self) -> bool {
		self.len() == other.len() &&
		self.chunks().flatten().eq(other.chunks().flatten())
	}
}

impl Eq for Snapshot { }

impl Hash for Snapshot {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u64(self.hash_code());
	}
}

impl PartialEq<ByteString> for Snapshot {
	fn eq(&self, other: &ByteString) -> bool {
		self.len() == other.len() &&
		self.chunks().flatten().eq(other.as_slice().iter())
	}
}

impl PartialEq<Snapshot> for ByteString {
	fn eq(&self, other: &Snapshot) -> bool {
		other == self
	}
}

impl PartialEq<[u8]> for Snapshot {
	fn eq(&self, other: &[u8]) -> bool {
		self.len() == other.len() &&
		self.chunks().flatten().eq(other.iter())
	}
}

impl PartialEq<[u8]> for ByteString {
	fn eq(&self, other: &[u8]) -> bool {
		self.data == other
	}
}

fn resolve(range: impl RangeBounds<usize>, len: usize) -> std::ops::Range<usize> {
	let start = match range.start_bound() {
		Bound::Included(&n) => n,
		Bound::Excluded(&n) => n + 1,
		Bound::Unbounded => 0,
	};
	let end = match range.end_bound() {
		Bound::Included(&n) => n + 1,
		Bound::Excluded(&n) => n,
		Bound::Unbounded => len,
	};
	assert!(
		start <= end && end <= len,
		"range {start}..{end} should be within length {len}",
	);
	start..end
}

fn fnv1a<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> u64 {
	const OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
	const PRIME: u64 = 0x0000_0100_0000_01B3;

	let mut hash = OFFSET;
	for chunk in chunks {
		for &byte in chunk {
			hash ^= u64::from(byte);
			hash = hash.wrapping_mul(PRIME);
		}
	}
	hash
}

fn hex_preview<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> String {
	const PREVIEW: usize = 32;
	let mut hex: String = chunks.flatten()
		.take(PREVIEW + 1)
		.map(|b| format!("{b:02x}"))
		.collect();
	if hex.len() > PREVIEW * 2 {
		hex.truncate(PREVIEW * 2);
		hex.push('…');
	}
	hex
}

#[cfg(feature = "hash")]
mod hashing {
	use digest::Digest;
	use super::{ByteString, Snapshot, Utf8String};

	impl ByteString {
		/// Feeds the bytes through `digest`, returning the final hash.
		pub fn hash_with(&self, mut digest: impl Digest) -> ByteString {
			digest.update(&self.data);
			digest.finalize().to_vec().into()
		}
	}

	impl Utf8String {
		/// Feeds the bytes through `digest`, returning the final hash.
		pub fn hash_with(&self, mut digest: impl Digest) -> ByteString {
			digest.update(self.as_bytes());
			digest.finalize().to_vec().into()
		}
	}

	impl Snapshot {
		/// Feeds the bytes through `digest`, returning the final hash.
		pub fn hash_with(&self, mut digest: impl Digest) -> ByteString {
			for chunk in self.chunks() {
				digest.update(chunk);
			}
			digest.finalize().to_vec().into()
		}
	}

	macro_rules! digest_fns {
		($($(#[$meta:meta])* $feature:literal $fn:ident $hasher:path;)+) => {
			impl ByteString { $(
				$(#[$meta])*
				#[cfg(feature = $feature)]
				pub fn $fn(&self) -> ByteString {
					self.hash_with(<$hasher>::new())
				}
			)+ }
			impl Snapshot { $(
				$(#[$meta])*
				#[cfg(feature = $feature)]
				pub fn $fn(&self) -> ByteString {
					self.hash_with(<$hasher>::new())
				}
			)+ }
		};
	}

	digest_fns! {
		/// Computes an MD5 checksum. MD5 is broken for cryptographic use;
		/// checksums only.
		"md5" md5 md5::Md5;
		/// Computes a SHA-1 checksum. SHA-1 is broken for cryptographic
		/// use; checksums only.
		"sha1" sha1 sha1::Sha1;
		/// Computes a SHA-256 hash.
		"sha2" sha256 sha2::Sha256;
		/// Computes a SHA-512 hash.
		"sha2" sha512 sha2::Sha512;
	}
}

#[cfg(feature = "hmac")]
mod keyed {
	use hmac::{Hmac, Mac};
	use sha2::{Sha256, Sha512};
	use super::{ByteString, Snapshot};

	impl ByteString {
		/// Computes an HMAC-SHA256 authentication code over the bytes.
		pub fn hmac_sha256(&self, key: &[u8]) -> ByteString {
			let mut mac = <Hmac<Sha256>>::new_from_slice(key)
				.expect("HMAC accepts keys of any length");
			mac.update(self.as_slice());
			mac.finalize().into_bytes().to_vec().into()
		}

		/// Computes an HMAC-SHA512 authentication code over the bytes.
		pub fn hmac_sha512(&self, key: &[u8]) -> ByteString {
			let mut mac = <Hmac<Sha512>>::new_from_slice(key)
				.expect("HMAC accepts keys of any length");
			mac.update(self.as_slice());
			mac.finalize().into_bytes().to_vec().into()
		}
	}

	impl Snapshot {
		/// Computes an HMAC-SHA256 authentication code over the bytes.
		pub fn hmac_sha256(&self, key: &[u8]) -> ByteString {
			let mut mac = <Hmac<Sha256>>::new_from_slice(key)
				.expect("HMAC accepts keys of any length");
			for chunk in self.chunks() {
				mac.update(chunk);
			}
			mac.finalize().into_bytes().to_vec().into()
		}
	}
}
