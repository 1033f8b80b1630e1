// SPDX-License-Identifier: Apache-2.0

//! ## How it works
//!
//! Data is written to and read from reusable pages of memory called
//! *segments*. When a segment is consumed, it's returned to a process-wide
//! *pool*; to write data, segments are claimed from it. When the pool is
//! exhausted, segments are allocated, and the pool keeps at most a fixed
//! number of them around for reuse.
//!
//! ### Segments
//!
//! A [`Buffer`] is an ordered list of segments acting as both a readable
//! and a writable stream. Transfers between buffers *move* whole segments
//! or *share* their pages rather than copying bytes: shared memory is
//! copy-on-write, readable from many holders and forked into an owned copy
//! the moment someone writes. Small amounts of data under a threshold
//! (`1024B` by default) are copied instead of shared, trading an O(n) copy
//! for keeping the writer's tail extendable.
//!
//! ### Streams
//!
//! Raw transports implement [`Source`](streams::Source) and
//! [`Sink`](streams::Sink), moving whole segments through buffers.
//! [`BufferedSource`] and [`BufferedSink`] layer the typed surface on top:
//! integer reads and writes in both byte orders, decimal and hexadecimal
//! text, UTF-8 strings, lines and code points, searching, peeking, and
//! bulk transfer. Adapters cover `std::io` transports, files, pipes, a
//! gzip frame layer, and hashing passthroughs.
//!
//! ### Byte strings
//!
//! [`ByteString`] owns contiguous bytes; [`Utf8String`] adds cached UTF-8
//! facts; [`Snapshot`] freezes a buffer's contents while sharing its
//! segment pages, so snapshots are cheap no matter the buffer size.

mod buffer;
mod buffered_wrappers;
mod byte_str;
mod error;
mod pattern;
pub mod pool;
pub(crate) mod segment;
pub mod streams;
pub mod utf8;

pub use buffer::{Buffer, BufferOptions, UnsafeCursor, Utf8Replacement};
pub use buffered_wrappers::{BufferedSink, BufferedSource, Peek};
pub use byte_str::{ByteString, Snapshot, Utf8String};
pub use error::{Error, ErrorKind, FrameError, Operation, Result, ResultExt};
pub use segment::{Segment, SIZE};
