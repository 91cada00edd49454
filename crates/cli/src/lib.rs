//! Terminal presentation for deckslim
//!
//! Provides shared CLI functionality:
//! - Status messages and error reports
//! - Size and reduction formatting
//! - Stage progress bars and spinners

#![warn(missing_docs)]

pub mod output;
pub mod progress;
