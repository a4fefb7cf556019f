//! Data models for pagefetch.

mod outcome;
mod request;

pub use outcome::{CapturedBody, CapturedResponse, FetchAttempt, FetchOutcome, Payload, Tier};
pub use request::{FetchOptions, FetchRequest};
