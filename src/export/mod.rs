//! Output: append reduced messages to a classic mbox archive.

pub mod mbox;
