pub mod application;
pub mod commands;
pub mod conda;
pub mod package;
pub mod runtime;
