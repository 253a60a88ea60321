//! Stacks application library
//!
//! The library module (book listing, borrowing and returns) and the
//! bootstrap that wires it to the database and HTTP server.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::Application;
pub use modules::library;
