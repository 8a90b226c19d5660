//! Common utilities shared across the token authorizer crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, unverified decoding, key helpers)
pub mod jwt;
