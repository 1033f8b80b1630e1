// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;
use once_cell::sync::Lazy;
use crate::{Error, Result};
use crate::segment::{Segment, SIZE};

/// Claims and recycles [`Segment`]s. Claiming prefers pooled segments over
/// allocation; recycling returns owned segments for reuse. Segments holding
/// shared pages are dropped instead of pooled, releasing the page once its
/// last sharer disappears.
pub trait Pool<const N: usize = SIZE> {
	/// Claims a single segment.
	fn claim_one(&self) -> Result<Segment<N>>;

	/// Recycles a single segment back into the pool.
	fn recycle_one(&self, segment: Segment<N>) -> Result;

	/// Recycles many segments back into the pool.
	fn recycle(&self, segments: impl IntoIterator<Item = Segment<N>>) -> Result
	where Self: Sized {
		for seg in segments {
			self.recycle_one(seg)?;
		}
		Ok(())
	}
}

#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("segment pool lock was poisoned")]
pub struct PoolError;

/// The process-wide free list, bounded at [`MAX_POOLED`](Self::MAX_POOLED)
/// segments. Claim and recycle are safe under concurrent use; the lock is
/// held only for the push or pop itself.
#[derive(Clone, Debug, Default)]
pub struct SharedPool;

static SEGMENTS: Lazy<Mutex<Vec<Segment>>> = Lazy::new(|| Mutex::new(Vec::new()));

impl SharedPool {
	/// The retention cap, `64 * SIZE` bytes of pooled memory.
	pub const MAX_POOLED: usize = 64;

	pub fn get() -> Self { Self }

	fn lock() -> Result<std::sync::MutexGuard<'static, Vec<Segment>>> {
		SEGMENTS.lock().map_err(|_| Error::pool(PoolError))
	}
}

impl Pool for SharedPool {
	fn claim_one(&self) -> Result<Segment> {
		Ok(Self::lock()?.pop().unwrap_or_default())
	}

	fn recycle_one(&self, mut segment: Segment) -> Result {
		if segment.is_shared() {
			return Ok(())
		}

		let mut segments = Self::lock()?;
		if segments.len() < Self::MAX_POOLED {
			segment.clear();
			segments.push(segment);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::{Pool, SharedPool};
	use crate::segment::Segment;

	#[test]
	fn claim_recycle_round_trip() {
		let pool = SharedPool::get();
		let mut seg = pool.claim_one().unwrap();
		assert!(seg.is_empty());
		seg.push_slice(b"junk");
		pool.recycle_one(seg).unwrap();

		let seg = pool.claim_one().unwrap();
		assert!(seg.is_empty(), "recycled segments should be cleared");
	}

	#[test]
	fn shared_segments_are_not_pooled() {
		let pool = SharedPool::get();
		let mut seg: Segment = Segment::empty();
		seg.push_slice(&[b'a'; 2048]);
		let _share = seg.share_all();

		// Dropping the shared half into the pool must not recycle the page
		// while the share is alive.
		pool.recycle_one(seg).unwrap();
		let claimed = pool.claim_one().unwrap();
		assert!(claimed.is_empty());
	}
}
