//! Mailbox parsing: dialect detection, the classic `From `-delimited reader,
//! and the Content-Length (mboxcl) boundary-recovery parser.

pub mod detect;
pub mod mbox;
pub mod mboxcl;
