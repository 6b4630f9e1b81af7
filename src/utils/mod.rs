//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 通用工具模块

pub mod redaction;
