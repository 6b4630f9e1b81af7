//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了乐观变更的同步机制。

pub mod in_flight;

pub use in_flight::{MutationGate, MutationPermit};
