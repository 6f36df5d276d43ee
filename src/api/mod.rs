//! 对外 API 模块
//!
//! 提供宿主程序使用内核的 SDK 入口。

pub mod sdk;

pub use sdk::{CoreState, VeneerCore};
