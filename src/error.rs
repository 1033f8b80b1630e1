// SPDX-License-Identifier: Apache-2.0

use std::{error, io, result};
use thiserror::Error as ThisError;

pub type Result<T = ()> = result::Result<T, Error>;

type BoxError = Box<dyn error::Error + Send + Sync>;

/// The operation an [`Error`] was raised by.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ThisError)]
pub enum Operation {
	#[default]
	#[error("unknown operation")]
	Unknown,
	#[error("read from buffer")]
	BufRead,
	#[error("write to buffer")]
	BufWrite,
	#[error("copy buffer")]
	BufCopy,
	#[error("clear buffer")]
	BufClear,
	#[error("flush buffer")]
	BufFlush,
	#[error("compact buffer")]
	BufCompact,
	#[error("cursor access")]
	Cursor,
	#[error("frame codec")]
	Frame,
	#[error("{0}")]
	Other(&'static str),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ErrorKind {
	#[error("premature end of input")]
	EndOfInput,
	#[error("stream closed")]
	Closed,
	#[error("invalid handle state")]
	State,
	#[error("invalid input")]
	InvalidInput,
	#[error("peek invalidated by its source")]
	Invalidated,
	#[error("operation cancelled")]
	Cancelled,
	#[error("operation timed out")]
	TimedOut,
	#[error("segment pool error")]
	Pool,
	#[error("IO error")]
	Io,
}

/// The error type for stream and buffer operations, carrying the failed
/// operation, the failure kind, and an optional underlying cause.
#[derive(Debug, ThisError)]
#[error("{kind} ({op})")]
pub struct Error {
	pub op: Operation,
	pub kind: ErrorKind,
	#[source]
	source: Option<BoxError>,
}

/// A gzip frame field that failed verification, with the actual and expected
/// values rendered in hex by its `Display` impl.
#[derive(Copy, Clone, Debug, ThisError)]
#[error("gzip {field} mismatch, expected {expected:#x}, was {actual:#x}")]
pub struct FrameError {
	pub field: &'static str,
	pub actual: u32,
	pub expected: u32,
}

#[derive(Copy, Clone, Debug, ThisError)]
#[error("{0}")]
struct Message(&'static str);

impl Error {
	pub(crate) fn new(op: Operation, kind: ErrorKind, source: Option<BoxError>) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new "end of input" error.
	pub fn eof(op: Operation) -> Self {
		Self::new(op, ErrorKind::EndOfInput, None)
	}

	/// Creates a new "closed" error.
	pub fn closed(op: Operation) -> Self {
		Self::new(op, ErrorKind::Closed, None)
	}

	/// Creates a new handle-misuse error.
	pub fn state(op: Operation, message: &'static str) -> Self {
		Self::new(op, ErrorKind::State, Some(Message(message).into()))
	}

	/// Creates a new invalid-input error.
	pub fn invalid_input(op: Operation, message: &'static str) -> Self {
		Self::new(op, ErrorKind::InvalidInput, Some(Message(message).into()))
	}

	/// Creates a new peek-invalidated error.
	pub fn invalidated(op: Operation) -> Self {
		Self::new(op, ErrorKind::Invalidated, None)
	}

	pub fn cancelled() -> Self {
		Self::new(Operation::Unknown, ErrorKind::Cancelled, None)
	}

	pub fn timed_out() -> Self {
		Self::new(Operation::Unknown, ErrorKind::TimedOut, None)
	}

	/// Creates a new IO error.
	pub fn io(op: Operation, error: io::Error) -> Self {
		Self::new(op, ErrorKind::Io, Some(error.into()))
	}

	/// Creates a new frame verification error.
	pub fn frame(field: &'static str, actual: u32, expected: u32) -> Self {
		Self::new(
			Operation::Frame,
			ErrorKind::Io,
			Some(FrameError { field, actual, expected }.into()),
		)
	}

	pub(crate) fn pool(error: impl error::Error + Send + Sync + 'static) -> Self {
		Self::new(Operation::Unknown, ErrorKind::Pool, Some(Box::new(error)))
	}

	/// Returns the error source downcast to a reference of `E`, if any.
	pub fn source_as<E: error::Error + 'static>(&self) -> Option<&E> {
		self.source.as_deref()?.downcast_ref()
	}

	/// Tags the error with `op` if no more specific operation is set.
	pub fn with_op(mut self, op: Operation) -> Self {
		if self.op == Operation::Unknown {
			self.op = op;
		}
		self
	}

	pub(crate) fn into_io(self) -> io::Error {
		match self.kind {
			ErrorKind::EndOfInput => io::Error::new(io::ErrorKind::UnexpectedEof, self),
			ErrorKind::Io => {
				let Some(src) = self.source_as::<io::Error>() else {
					return io::Error::other(self)
				};
				io::Error::new(src.kind(), self)
			}
			_ => io::Error::other(self),
		}
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		if let io::ErrorKind::UnexpectedEof = value.kind() {
			Self::eof(Operation::Unknown)
		} else {
			Self::io(Operation::Unknown, value)
		}
	}
}

/// Tags errors with the operation they were raised by.
pub trait ResultExt<T> {
	fn context(self, op: Operation) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
	fn context(self, op: Operation) -> Result<T> {
		self.map_err(|err| err.with_op(op))
	}
}
