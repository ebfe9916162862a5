pub mod app;
pub mod chain;
