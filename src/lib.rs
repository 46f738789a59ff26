pub mod canvas;
pub mod commands;
pub mod config;
pub mod document;
pub mod fold;
pub mod geometry;
#[doc(hidden)]
pub mod test_support;
pub mod vault;
