// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::rc::Rc;
use pretty_assertions::assert_eq;
use segio::{Buffer, ByteString, Result, Segment};
use segio::pool::Pool;

#[test]
fn snapshot_equals_current_contents() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"first segment of text").unwrap();

	let snap = buf.snapshot();
	assert_eq!(snap.len(), buf.count());
	assert!(snap == *b"first segment of text".as_slice());

	// Later writes are invisible to the snapshot.
	buf.write_from_slice(b" and more").unwrap();
	assert_eq!(snap.len(), 21);
	assert_eq!(snap.to_vec(), b"first segment of text");
}

#[test]
fn snapshot_survives_reading_the_buffer() {
	let mut buf = Buffer::default();
	buf.write_from_slice(&[b'z'; 10_000]).unwrap();

	let snap = buf.snapshot();
	buf.skip_all().unwrap();
	assert!(buf.is_empty());
	assert_eq!(snap.len(), 10_000);
	assert!(snap.chunks().flatten().all(|&b| b == b'z'));
}

/// A pool that records every segment it actually retains.
#[derive(Clone, Default)]
struct RecordingPool {
	pooled: Rc<RefCell<Vec<Segment>>>,
}

impl Pool for RecordingPool {
	fn claim_one(&self) -> Result<Segment> {
		Ok(self.pooled.borrow_mut().pop().unwrap_or_default())
	}

	fn recycle_one(&self, mut segment: Segment) -> Result {
		if segment.is_shared() {
			return Ok(())
		}
		segment.clear();
		self.pooled.borrow_mut().push(segment);
		Ok(())
	}
}

#[test]
fn snapshot_pages_stay_out_of_the_pool() {
	let pool = RecordingPool::default();
	let mut buf = Buffer::new(pool.clone());
	buf.write_from_slice(b"abc").unwrap();

	let snap = buf.snapshot();
	buf.clear().unwrap();

	assert_eq!(snap.utf8().unwrap(), "abc");
	assert!(
		pool.pooled.borrow().is_empty(),
		"pages frozen by a snapshot must not be recycled",
	);

	// Once the snapshot drops the buffer recycles as usual.
	drop(snap);
	buf.write_from_slice(b"def").unwrap();
	buf.clear().unwrap();
	assert_eq!(pool.pooled.borrow().len(), 1);
}

#[test]
fn clone_then_concurrent_style_reads() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"shared bytes everywhere").unwrap();
	let clone = buf.clone();

	// Both sides read the same content without disturbing each other.
	let a = buf.snapshot();
	let b = clone.snapshot();
	assert_eq!(a.to_vec(), b.to_vec());
}

#[test]
fn cross_representation_equality() {
	let mut buf = Buffer::default();
	buf.write_from_slice(b"equal").unwrap();
	let snap = buf.snapshot();
	let owned = ByteString::from(&b"equal"[..]);
	let utf8 = owned.decode_utf8().unwrap();

	assert!(snap == owned);
	assert!(owned == snap);
	assert!(utf8 == owned);
	assert_eq!(owned.hash_code(), snap.hash_code());
}

#[test]
fn snapshot_sent_across_threads() {
	let mut buf = Buffer::default();
	buf.write_from_slice(&[b'k'; 9000]).unwrap();
	let snap = buf.snapshot();

	let handle = std::thread::spawn(move || {
		assert_eq!(snap.len(), 9000);
		snap.chunks().flatten().all(|&b| b == b'k')
	});
	// The owner keeps mutating while the other thread reads.
	buf.write_from_slice(b"more").unwrap();
	assert!(handle.join().unwrap());
}
