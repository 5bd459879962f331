//! TeeFE: place one piece of artwork on a garment mockup, move / scale /
//! rotate it, preview it without editing chrome and export it as PNG.
//!
//! The binary (`src/main.rs`) is a thin router between the eframe editor in
//! [`app`] and the headless exporter in [`cli`]; everything else is usable on
//! its own.

pub mod app;
pub mod assets;
pub mod cli;
pub mod config;
pub mod export;
pub mod garment;
pub mod ingest;
pub mod logger;
pub mod ops;
pub mod render;
pub mod scene;
