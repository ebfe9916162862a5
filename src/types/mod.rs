pub mod config;
pub mod proposal;
