pub mod app;
pub mod files;
