//! Task completion graph.

mod graph;

pub use graph::{Task, TaskGraph, TaskObserver, TaskPolicy};
