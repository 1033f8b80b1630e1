// SPDX-License-Identifier: Apache-2.0

//! The gzip frame layer: header and trailer handling around a raw-deflate
//! collaborator ([`flate2`]). Frame fields are verified on inflate; a
//! mismatched FHCRC, CRC or ISIZE raises a framing error carrying the
//! actual and expected values, rendered in hex.

use std::io;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use crate::{Buffer, Error, Result};
use crate::buffered_wrappers::{BufferedSink, BufferedSource};
use crate::error::Operation::Frame;
use crate::pool::Pool;
use crate::streams::{BufSink, BufSource, BufStream, Sink, SinkExt, Source, SourceExt, Stream};

const MAGIC: [u8; 2] = [0x1F, 0x8B];
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// The scratch window for one deflate/inflate step.
const SCRATCH: usize = 8192;

fn codec_error(err: impl std::error::Error + Send + Sync + 'static) -> Error {
	Error::io(Frame, io::Error::other(err))
}

/// A [`Sink`] deflating everything written to it into a gzip frame on the
/// inner sink. The frame only completes on [`close`](Stream::close), which
/// finishes the deflate stream and writes the CRC-32 and ISIZE trailer.
pub struct GzipSink<W: Sink> {
	sink: BufferedSink<W>,
	deflate: Compress,
	crc: crc32fast::Hasher,
	input_size: u64,
	header_written: bool,
	closed: bool,
}

impl<W: Sink> GzipSink<W> {
	pub fn new(sink: W) -> Self {
		Self {
			sink: sink.buffered(),
			deflate: Compress::new(Compression::default(), false),
			crc: crc32fast::Hasher::new(),
			input_size: 0,
			header_written: false,
			closed: false,
		}
	}

	/// Returns a reference to the inner sink.
	pub fn inner(&self) -> &W { self.sink.inner() }

	fn write_header(&mut self) -> Result {
		if self.header_written {
			return Ok(())
		}
		self.header_written = true;
		// Magic, deflate method, no flags, zero mtime, no extra flags, and
		// an unset OS byte.
		self.sink.write_from_slice(&[
			MAGIC[0], MAGIC[1], METHOD_DEFLATE, 0, 0, 0, 0, 0, 0, 0,
		])
	}

	/// Runs the compressor over empty input until `flush` completes.
	fn deflate_tail(&mut self, flush: FlushCompress) -> Result {
		loop {
			let before_out = self.deflate.total_out();
			let mut scratch = [0; SCRATCH];
			let status = self.deflate
				.compress(&[], &mut scratch, flush)
				.map_err(codec_error)?;
			let produced = (self.deflate.total_out() - before_out) as usize;
			self.sink.write_from_slice(&scratch[..produced])?;

			if matches!(status, Status::StreamEnd) || produced == 0 {
				return Ok(())
			}
		}
	}
}

impl<W: Sink> Stream for GzipSink<W> {
	fn is_closed(&self) -> bool { self.closed }

	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;

		let finish: Result = (|| {
			self.write_header()?;
			self.deflate_tail(FlushCompress::Finish)?;
			let crc = self.crc.clone().finalize();
			self.sink.write_u32_le(crc)?;
			self.sink.write_u32_le(self.input_size as u32)
		})();
		let close = self.sink.close();
		finish?;
		close
	}
}

impl<W: Sink> Sink for GzipSink<W> {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(Frame))
		}
		if source.count() < byte_count {
			return Err(Error::eof(Frame))
		}
		self.write_header()?;

		let Self { sink, deflate, crc, input_size, .. } = self;
		source.read_segments(byte_count, |chunk| {
			crc.update(chunk);
			*input_size += chunk.len() as u64;

			let mut off = 0;
			while off < chunk.len() {
				let before_in = deflate.total_in();
				let before_out = deflate.total_out();
				let mut scratch = [0; SCRATCH];
				deflate.compress(&chunk[off..], &mut scratch, FlushCompress::None)
					.map_err(codec_error)?;
				let used = (deflate.total_in() - before_in) as usize;
				let produced = (deflate.total_out() - before_out) as usize;
				off += used;
				sink.write_from_slice(&scratch[..produced])?;

				if used == 0 && produced == 0 {
					return Err(codec_error(io::Error::other(
						"deflate made no progress",
					)))
				}
			}
			Ok(chunk.len())
		})?;

		self.sink.emit()?;
		Ok(byte_count)
	}

	/// Sync-flushes the deflate stream and the inner sink, so everything
	/// written so far is decodable downstream.
	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Frame))
		}
		self.write_header()?;
		self.deflate_tail(FlushCompress::Sync)?;
		self.sink.flush()
	}
}

impl<W: Sink> Drop for GzipSink<W> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

enum FrameState {
	Header,
	Body,
	Done,
}

/// A [`Source`] inflating a gzip frame read from the inner source. The
/// header is parsed (and its FHCRC verified) on the first read; the
/// trailer's CRC-32 and ISIZE are verified when the deflate stream ends.
pub struct GzipSource<S: Source> {
	source: BufferedSource<S>,
	inflate: Decompress,
	crc: crc32fast::Hasher,
	output_size: u64,
	state: FrameState,
}

impl<S: Source> GzipSource<S> {
	pub fn new(source: S) -> Self {
		Self {
			source: source.buffered(),
			inflate: Decompress::new(false),
			crc: crc32fast::Hasher::new(),
			output_size: 0,
			state: FrameState::Header,
		}
	}

	fn read_header(&mut self) -> Result {
		let mut hasher = crc32fast::Hasher::new();

		let fixed: [u8; 10] = self.source.read_array()?;
		hasher.update(&fixed);
		if fixed[..2] != MAGIC {
			let actual = u32::from(fixed[0]) << 8 | u32::from(fixed[1]);
			return Err(Error::frame("magic", actual, 0x1F8B))
		}
		if fixed[2] != METHOD_DEFLATE {
			return Err(Error::frame("method", fixed[2].into(), METHOD_DEFLATE.into()))
		}
		let flags = fixed[3];

		if flags & FEXTRA != 0 {
			let len_bytes: [u8; 2] = self.source.read_array()?;
			hasher.update(&len_bytes);
			let len = usize::from(u16::from_le_bytes(len_bytes));
			self.source.require(len)?;
			let extra = self.source.read_byte_string(len)?;
			hasher.update(extra.as_slice());
		}
		if flags & FNAME != 0 {
			self.hash_zero_terminated(&mut hasher)?;
		}
		if flags & FCOMMENT != 0 {
			self.hash_zero_terminated(&mut hasher)?;
		}
		if flags & FHCRC != 0 {
			let expected = u16::from_le_bytes(self.source.read_array()?);
			let actual = (hasher.finalize() & 0xFFFF) as u16;
			if actual != expected {
				return Err(Error::frame("FHCRC", actual.into(), expected.into()))
			}
		}
		Ok(())
	}

	fn hash_zero_terminated(&mut self, hasher: &mut crc32fast::Hasher) -> Result {
		let end = self.source
			.index_of(0)?
			.ok_or_else(|| Error::eof(Frame))?;
		let field = self.source.read_byte_string(end + 1)?;
		hasher.update(field.as_slice());
		Ok(())
	}

	fn read_trailer(&mut self) -> Result {
		self.source.require(8)?;
		let expected_crc = self.source.read_u32_le()?;
		let expected_size = self.source.read_u32_le()?;

		let actual_crc = self.crc.clone().finalize();
		if actual_crc != expected_crc {
			return Err(Error::frame("CRC", actual_crc, expected_crc))
		}
		let actual_size = self.output_size as u32;
		if actual_size != expected_size {
			return Err(Error::frame("ISIZE", actual_size, expected_size))
		}
		Ok(())
	}

	/// Inflates one step into `sink`, returning the bytes produced. Zero
	/// means the compressor needs more input.
	fn inflate_some(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		let window = byte_count.min(SCRATCH);
		let mut scratch = [0; SCRATCH];

		let (used, produced, status) = {
			let chunk = self.source.buf()
				.chunks()
				.find(|c| !c.is_empty())
				.unwrap_or(&[]);
			let before_in = self.inflate.total_in();
			let before_out = self.inflate.total_out();
			let status = self.inflate
				.decompress(chunk, &mut scratch[..window], FlushDecompress::None)
				.map_err(codec_error)?;
			let used = (self.inflate.total_in() - before_in) as usize;
			let produced = (self.inflate.total_out() - before_out) as usize;
			(used, produced, status)
		};

		self.source.buf_mut().skip(used)?;
		if produced > 0 {
			self.crc.update(&scratch[..produced]);
			self.output_size += produced as u64;
			sink.write_from_slice(&scratch[..produced])?;
		}
		if matches!(status, Status::StreamEnd) {
			self.read_trailer()?;
			self.state = FrameState::Done;
		}
		Ok(produced)
	}
}

impl<S: Source> Stream for GzipSource<S> {
	fn is_closed(&self) -> bool {
		self.source.is_closed()
	}

	fn close(&mut self) -> Result {
		self.source.close()
	}
}

impl<S: Source> Source for GzipSource<S> {
	fn read(&mut self, sink: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if byte_count == 0 {
			return Ok(0)
		}
		if let FrameState::Header = self.state {
			self.read_header()?;
			self.state = FrameState::Body;
		}

		loop {
			if let FrameState::Done = self.state {
				return Ok(0)
			}
			// A truncated deflate stream surfaces as end-of-input here.
			self.source.require(1)?;
			let produced = self.inflate_some(sink, byte_count)?;
			if produced > 0 {
				return Ok(produced)
			}
		}
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::{Buffer, Result};
	use crate::error::FrameError;
	use crate::segment::SIZE;
	use crate::streams::{BufSource, Sink, SourceExt, Stream};
	use super::{GzipSink, GzipSource};

	fn gzip(payload: &[u8]) -> Vec<u8> {
		let mut sink = GzipSink::new(Vec::new());
		let mut buf = Buffer::default();
		buf.write_from_slice(payload).unwrap();
		let count = buf.count();
		sink.write(&mut buf, count).unwrap();
		sink.close().unwrap();
		sink.inner().clone()
	}

	fn gunzip(frame: &[u8]) -> Result<Vec<u8>> {
		let mut source = GzipSource::new(frame).buffered();
		let mut bytes = Vec::new();
		while !source.exhausted()? {
			let chunk = source.read_byte_string(SIZE)?;
			bytes.extend_from_slice(chunk.as_slice());
		}
		Ok(bytes)
	}

	#[test]
	fn frame_round_trip() {
		let payload = b"It's a UNIX system! I know this!";
		let frame = gzip(payload);
		assert_eq!(&frame[..3], &[0x1F, 0x8B, 0x08]);
		assert_eq!(gunzip(&frame).unwrap(), payload);
	}

	#[test]
	fn empty_payload_frames_cleanly() {
		let frame = gzip(b"");
		assert_eq!(gunzip(&frame).unwrap(), b"");
	}

	#[test]
	fn corrupt_crc_is_reported_in_hex() {
		let payload = b"check the trailer";
		let mut frame = gzip(payload);
		let crc_at = frame.len() - 8;
		frame[crc_at] ^= 0xFF;

		let err = gunzip(&frame).unwrap_err();
		let frame_err = err.source_as::<FrameError>().expect("a framing error");
		assert_eq!(frame_err.field, "CRC");
		assert!(format!("{frame_err}").contains("0x"));
	}

	#[test]
	fn corrupt_isize_is_detected() {
		let payload = b"check the length";
		let mut frame = gzip(payload);
		let isize_at = frame.len() - 4;
		frame[isize_at] = frame[isize_at].wrapping_add(1);

		let err = gunzip(&frame).unwrap_err();
		let frame_err = err.source_as::<FrameError>().expect("a framing error");
		assert_eq!(frame_err.field, "ISIZE");
	}

	#[test]
	fn header_crc_verified_when_flagged() {
		let payload = b"flagged header";
		let base = gzip(payload);

		// Rebuild the frame with FHCRC set and the matching checksum.
		let mut flagged = base.clone();
		flagged[3] |= 0x02;
		let mut hasher = crc32fast::Hasher::new();
		hasher.update(&flagged[..10]);
		let crc = (hasher.finalize() & 0xFFFF) as u16;
		flagged.splice(10..10, crc.to_le_bytes());
		assert_eq!(gunzip(&flagged).unwrap(), payload);

		// Flip the stored checksum and the decode must fail.
		let mut corrupt = flagged.clone();
		corrupt[10] ^= 0xFF;
		let err = gunzip(&corrupt).unwrap_err();
		let frame_err = err.source_as::<FrameError>().expect("a framing error");
		assert_eq!(frame_err.field, "FHCRC");
	}

	#[test]
	fn named_frame_skips_the_name() {
		let payload = b"named";
		let base = gzip(payload);

		let mut named = base.clone();
		named[3] |= 0x08;
		named.splice(10..10, *b"data.txt\0");
		assert_eq!(gunzip(&named).unwrap(), payload);
	}
}
