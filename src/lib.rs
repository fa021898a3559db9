pub mod bridge;
pub mod cli;
pub mod config;
pub mod embed;
pub mod protocol;
