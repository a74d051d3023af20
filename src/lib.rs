// RPG Maker 2000/2003 player graphics core

pub mod config;
pub mod graphics;
pub mod logging;

pub use config::RenderOptions;
pub use logging::LogLevel;
