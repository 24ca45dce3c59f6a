//! Status sources.
//!
//! This module provides:
//! - The `StatusSource` trait every database client implements
//! - `SourceConnection`, which applies the retry policy around it
//! - The MongoDB implementation
//!
//! The rest of the application must interact exclusively through
//! `SourceConnection`.

pub mod adapter;
pub mod connection;
pub mod mongo;

pub use adapter::StatusSource;
pub use connection::SourceConnection;
pub use mongo::MongoStatusSource;
