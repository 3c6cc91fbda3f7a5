pub mod core;
pub mod services;
pub mod timeline;
pub mod utils;
