#![doc = include_str!("../README.md")]

mod config;
mod error;
mod event;
mod policy;
mod pool;
mod task;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::policy::*;
pub use crate::pool::*;
pub use crate::task::{TaskError, TaskId, TaskProcessor, WorkerId};
