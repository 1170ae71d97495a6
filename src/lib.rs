#![doc = include_str!("../README.md")]

pub mod cache;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use cache::*;
pub use error::SumpError;
pub use handler::*;
pub use lifecycle::*;
pub use queue::*;
pub use scheduler::*;
pub use store::*;
pub use worker::*;
