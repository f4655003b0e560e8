pub mod bitmap;
pub mod config;
pub mod constants;
pub mod error;
pub mod handle_arena;
