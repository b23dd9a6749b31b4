//! # Gateway Service
//!
//! Request orchestration for the LLM Request Gateway. [`Gateway`] ties the
//! provider registry, the rate limiter, the response cache and the retry
//! policy together behind two operations: a blocking completion and a
//! streamed one.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod gateway;
pub mod stream;

pub use gateway::{Gateway, GatewayBuilder};
pub use stream::{decorate, EventStream};
