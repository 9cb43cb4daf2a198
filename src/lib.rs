//! `mboxlite` — strip quoted-reply noise from MBOX archives.
//!
//! This crate provides the core library for detecting mailbox dialects
//! (classic mbox and Content-Length-prefixed mboxcl), recovering message
//! boundaries, removing quote blocks from message bodies, and writing the
//! reduced archive back out.

pub mod config;
pub mod error;
pub mod export;
pub mod lighten;
pub mod model;
pub mod parser;
pub mod pipeline;
