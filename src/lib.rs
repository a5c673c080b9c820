pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod images;
pub mod memory;
pub mod offers;
pub mod state;
pub mod storage;

#[cfg(test)]
mod api_tests;
