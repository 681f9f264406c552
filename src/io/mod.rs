//! I/O infrastructure: the content-addressed finding cache and atomic
//! document persistence.
//!
//! Everything a concurrent reader may observe mid-write goes through
//! [`persist`]'s write-then-rename helpers; the aggregator and warm-cache
//! reruns depend on never seeing a partial document.

pub mod cache;
pub mod persist;
