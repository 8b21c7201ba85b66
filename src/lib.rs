//! Bursty traffic generation.
//!
//! A [`generator::BurstGenerator`] yields bursts: a size in bytes and the time to wait before
//! the next burst. The [`sender`] splits each burst into datagrams stamped with a
//! [`header::FragmentationHeader`], and the [`sink`] rebuilds bursts from the datagrams it
//! receives, in any order.

pub mod config;
pub mod error;
pub mod generator;
pub mod header;
pub mod random;
pub mod sender;
pub mod sink;
pub mod structs;

pub use error::{Error, Result, WireError};
