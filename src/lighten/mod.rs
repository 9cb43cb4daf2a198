//! Message lightening: quote-block removal, HTML reduction, and the
//! per-message orchestration that produces reduced output messages.

pub mod html;
pub mod message;
pub mod quotes;
