//! audiomail: a voice-controlled email drafting assistant.

mod app;
mod capture;
mod commands;
mod config;
mod generation;
mod logging;
mod transcription;
mod workflow;

use std::process;

fn main() {
    if let Err(e) = app::run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
