// SPDX-License-Identifier: Apache-2.0

#![cfg(feature = "hash")]

use digest::{Digest, FixedOutputReset};
use crate::{Buffer, ByteString, Result};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// A [`Source`] that hashes data read through it from its inner source.
pub struct HashSource<S: Source, H: Digest> {
	source: S,
	hasher: H,
}

impl<S: Source, H: Digest> HashSource<S, H> {
	pub fn new(source: S, hasher: H) -> Self {
		Self { source, hasher }
	}

	/// Returns a reference to the hasher.
	pub fn hasher(&self) -> &H { &self.hasher }

	/// Returns a clone of the current hash.
	pub fn hash(&self) -> ByteString
	where H: Clone {
		self.hasher.clone().finalize().to_vec().into()
	}

	/// Takes the current hash, resetting the hash function state.
	pub fn take_hash(&mut self) -> ByteString
	where H: FixedOutputReset {
		self.hasher.finalize_reset().to_vec().into()
	}

	pub fn into_inner(self) -> S { self.source }
}

impl<S: Source, H: Digest> Stream for HashSource<S, H> {
	fn is_closed(&self) -> bool { self.source.is_closed() }

	fn close(&mut self) -> Result { self.source.close() }
}

impl<S: Source, H: Digest> Source for HashSource<S, H> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		// Stage the pull so the passing bytes can be hashed, then move the
		// segments on without copying them again.
		let mut staging = Buffer::default();
		let read = self.source.read(&mut staging, byte_count)?;
		for chunk in staging.chunks() {
			Digest::update(&mut self.hasher, chunk);
		}
		staging.read_all(sink)?;
		Ok(read)
	}
}

/// A [`Sink`] that hashes data written through it to its inner sink.
pub struct HashSink<W: Sink, H: Digest> {
	sink: W,
	hasher: H,
}

impl<W: Sink, H: Digest> HashSink<W, H> {
	pub fn new(sink: W, hasher: H) -> Self {
		Self { sink, hasher }
	}

	/// Returns a reference to the hasher.
	pub fn hasher(&self) -> &H { &self.hasher }

	/// Returns a clone of the current hash.
	pub fn hash(&self) -> ByteString
	where H: Clone {
		self.hasher.clone().finalize().to_vec().into()
	}

	/// Takes the current hash, resetting the hash function state.
	pub fn take_hash(&mut self) -> ByteString
	where H: FixedOutputReset {
		self.hasher.finalize_reset().to_vec().into()
	}

	pub fn into_inner(self) -> W { self.sink }
}

impl<W: Sink, H: Digest> Stream for HashSink<W, H> {
	fn is_closed(&self) -> bool { self.sink.is_closed() }

	fn close(&mut self) -> Result { self.sink.close() }
}

impl<W: Sink, H: Digest> Sink for HashSink<W, H> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		// Hash the outgoing range before the sink consumes it.
		let mut remaining = byte_count;
		for chunk in source.chunks() {
			if remaining == 0 { break }
			let len = remaining.min(chunk.len());
			Digest::update(&mut self.hasher, &chunk[..len]);
			remaining -= len;
		}
		self.sink.write(source, byte_count)
	}

	fn flush(&mut self) -> Result { self.sink.flush() }
}
