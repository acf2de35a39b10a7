#[cfg(test)]
mod tests;

pub mod app;
pub mod config;
pub mod controller;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod supervisor;
