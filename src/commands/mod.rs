//! Application command handlers for duorec.
//!
//! # Commands
//! - `record`: Record the camera and microphone into both destinations
//! - `delete`: Delete a video and its paired audio file
//! - `recordings`: List the recordings of a destination
//! - `play`: Open a video in the system player
//! - `config`: Show, change or edit the configuration
//! - `list_devices`: List cameras and audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod delete;
pub mod list_devices;
pub mod logs;
pub mod play;
pub mod record;
pub mod recordings;

pub use config::handle_config;
pub use delete::handle_delete;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use play::handle_play;
pub use record::handle_record;
pub use recordings::handle_recordings;
