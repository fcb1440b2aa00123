//! Mentord — a mentor chat backend.
//!
//! Single Rust binary. Sits between a browser chat client and an LLM
//! completion API, and maintains a rolling per-student summary in SQLite so
//! every exchange is contextualized by what came before.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod config;
pub mod logging;
pub mod store;
pub mod template;

pub mod pipeline;
pub mod server;
