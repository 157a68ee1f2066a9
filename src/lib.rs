pub mod backend;
pub mod classify;
pub mod corpus;
pub mod engine;
pub mod engine_async;
pub mod error;
pub mod i18n;
pub mod index;
pub mod pool;
pub mod report;
pub mod types;

// Re-export the localization functions next to the `t!`/`t_args!` macros
pub use crate::i18n::{t, t_with_args};
