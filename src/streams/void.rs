// SPDX-License-Identifier: Apache-2.0

use crate::{Buffer, Error, Result};
use crate::error::Operation;
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// A source that is always exhausted.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoidSource;

impl Stream for VoidSource { }

impl Source for VoidSource {
	fn read(&mut self, _sink: &mut Buffer<impl Pool>, _byte_count: usize) -> Result<usize> {
		Ok(0)
	}
}

/// A sink that discards everything written to it.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoidSink;

impl Stream for VoidSink { }

impl Sink for VoidSink {
	fn write(&mut self, source: &mut Buffer<impl Pool>, byte_count: usize) -> Result<usize> {
		if source.count() < byte_count {
			return Err(Error::eof(Operation::BufWrite))
		}
		source.skip(byte_count)
	}
}
