#![forbid(unsafe_code)]

//! Core: host-environment capabilities and primitives for tourkit.
//!
//! This crate holds everything the engine needs from its host that is not
//! orchestration logic: pixel geometry and tooltip placement, keyboard
//! event types, the DOM capability interface (with a fake adapter for
//! deterministic tests), local key-value persistence, and the reflow
//! coalescer that bounds placement recomputation to frame granularity.

pub mod dom;
pub mod event;
pub mod geometry;
pub mod reflow;
pub mod storage;
