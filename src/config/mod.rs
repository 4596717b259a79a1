//! Configuration management for duorec.
//!
//! Loads and saves the TOML configuration that selects the custom
//! destination, the video container and the capture device settings.

pub mod file;

pub use file::ConfigFile;
