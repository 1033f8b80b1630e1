// SPDX-License-Identifier: Apache-2.0

use crate::segment::SIZE;

/// The byte written for an unpaired surrogate code point.
///
/// The base behavior writes ASCII `?`, matching callers that predate the
/// canonical replacement character. [`ReplacementChar`] switches to the
/// three-byte encoding of `U+FFFD`.
///
/// [`ReplacementChar`]: Utf8Replacement::ReplacementChar
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Utf8Replacement {
	#[default]
	QuestionMark,
	ReplacementChar,
}

/// Options for tuning [`Buffer`](super::Buffer) behavior.
///
/// # Share threshold
///
/// The minimum size for segment data to be shared rather than copied when a
/// segment splits. Defaults to `1024B`, one eighth the segment size. Sharing
/// is O(1) where copying is O(n), but many small shared segments fragment the
/// buffer and freeze their pages against in-place writes, so small splits
/// copy.
///
/// # Compact threshold
///
/// The total fragmentation (slack before and after readable windows on
/// interior segments) that triggers compacting. Defaults to `4096B`, half the
/// segment size.
#[derive(Copy, Clone, Debug)]
#[non_exhaustive]
pub struct BufferOptions {
	pub share_threshold: usize,
	pub compact_threshold: usize,
	pub utf8_replacement: Utf8Replacement,
}

impl Default for BufferOptions {
	fn default() -> Self {
		Self {
			share_threshold: SIZE / 8,
			compact_threshold: SIZE / 2,
			utf8_replacement: Utf8Replacement::default(),
		}
	}
}

impl BufferOptions {
	/// Presets the options to create a "lean" buffer, one that always shares
	/// and compacts.
	pub fn lean() -> Self {
		Self {
			share_threshold: 0,
			compact_threshold: 0,
			..Self::default()
		}
	}

	/// Sets the segment share threshold.
	pub fn set_share_threshold(mut self, value: usize) -> Self {
		self.share_threshold = value;
		self
	}

	/// Sets the fragmentation-compact threshold.
	pub fn set_compact_threshold(mut self, value: usize) -> Self {
		self.compact_threshold = value;
		self
	}

	/// Sets the surrogate replacement policy for UTF-8 writes.
	pub fn set_utf8_replacement(mut self, value: Utf8Replacement) -> Self {
		self.utf8_replacement = value;
		self
	}
}
