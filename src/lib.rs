// src/lib.rs

//! _gharchivelib_ streams the newline-delimited JSON events of the
//! [GH Archive] hourly objects.
//!
//! See [`readers`] for an overview.
//!
//! [GH Archive]: https://www.gharchive.org/

pub mod common;
pub mod data;
pub mod debug;
pub mod readers;
#[cfg(test)]
pub mod tests;
