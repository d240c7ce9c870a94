//! Application command handlers for audiomail.
//!
//! This module organizes command handling into separate submodules, each
//! responsible for a specific application command.
//!
//! # Commands
//! - `compose`: Record, transcribe, draft, and refine an email (default)
//! - `config`: Open configuration file in the user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod compose;
pub mod config;
pub mod list_devices;
pub mod logs;

pub use compose::handle_compose;
pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
