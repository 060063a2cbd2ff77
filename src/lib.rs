//! Bookstore application library
//!
//! Application modules plus the bootstrap that wires settings, storage and
//! the HTTP server together.

pub mod bootstrap;
pub mod modules;

pub use bootstrap::App;
pub use modules::books::models::{Book, BookInput, Price};
