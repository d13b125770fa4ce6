pub mod backgrounds;
pub mod config;
pub mod process;
