//! Integration test crate for Viarte Studio.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple viarte crates to verify they work together.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod export;

#[cfg(test)]
mod gpu;
