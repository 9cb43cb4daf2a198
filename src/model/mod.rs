//! Core data model types for raw and reduced mailbox messages.

pub mod message;
