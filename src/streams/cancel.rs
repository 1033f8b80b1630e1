// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation for buffered streams. A scope is an external
//! collaborator: attach one with
//! [`set_cancel_scope`](crate::streams::BufferedSource::set_cancel_scope)
//! and the buffered layer polls it between segment transfers, surfacing
//! `Cancelled` or `TimedOut` without interrupting in-flight raw IO itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use crate::{Error, Result};

/// Polled between segment transfers; an error stops the operation.
pub trait CancelScope: Send + Sync {
	fn check(&self) -> Result;
}

/// A scope cancelled by flagging it from any thread.
#[derive(Debug, Default)]
pub struct CancelToken {
	cancelled: AtomicBool,
}

impl CancelToken {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Acquire)
	}
}

impl CancelScope for CancelToken {
	fn check(&self) -> Result {
		if self.is_cancelled() {
			Err(Error::cancelled())
		} else {
			Ok(())
		}
	}
}

/// A scope that times out at a fixed instant.
#[derive(Copy, Clone, Debug)]
pub struct Deadline {
	at: Instant,
}

impl Deadline {
	pub fn after(timeout: Duration) -> Arc<Self> {
		Arc::new(Self { at: Instant::now() + timeout })
	}

	pub fn at(at: Instant) -> Arc<Self> {
		Arc::new(Self { at })
	}
}

impl CancelScope for Deadline {
	fn check(&self) -> Result {
		if Instant::now() >= self.at {
			Err(Error::timed_out())
		} else {
			Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use crate::error::ErrorKind;
	use crate::streams::{BufSource, SourceExt};
	use super::{CancelScope, CancelToken};

	#[test]
	fn cancelled_scope_stops_reads() {
		let token = CancelToken::new();
		let mut source = (&b"some bytes"[..]).buffered();
		source.set_cancel_scope(token.clone());

		assert!(source.request(4).unwrap());

		token.cancel();
		// Buffered bytes are still served; the next pull is refused.
		let err = source.request(100).unwrap_err();
		assert_eq!(err.kind, ErrorKind::Cancelled);
	}

	#[test]
	fn token_checks() {
		let token = CancelToken::new();
		assert!(token.check().is_ok());
		token.cancel();
		assert!(token.check().is_err());
	}
}
