// Fixture management around the draw engine: configuration, storage,
// CSV import and export, and the command implementations used by the
// `fixja` binary.

pub mod commands;
pub mod config;
pub mod db;
pub mod export;
pub mod teams;
