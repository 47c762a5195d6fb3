// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`invoker`] provides the `BatchInvoker` trait and the production
//!   `ProcessInvoker`, which runs one binary over one batch of images with
//!   `tokio::process::Command`. Tests swap in scripted invokers.
//! - [`output`] turns the binary's stdout lines into `ExecutionRecord`s.

pub mod invoker;
pub mod output;

pub use invoker::{BatchInvoker, InvocationError, InvocationRequest, ProcessInvoker};
pub use output::{parse_line, parse_output};
