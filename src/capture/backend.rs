//! Audio backend abstraction and the cpal production implementation.
//!
//! Capture logic never talks to cpal directly. It goes through `AudioBackend`
//! so the session can be driven by a test double, and so the device callback
//! stays a plain producer writing into a channel.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::Sender;

use super::token::{CancelReason, CancellationToken};
use super::CaptureConfig;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Reports a mid-capture stream error.
///
/// Records the message as the cancellation reason so the session classifies
/// the attempt as a stream error and the watcher stops polling.
#[derive(Clone)]
pub struct FaultReporter {
    token: CancellationToken,
}

impl FaultReporter {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn report(&self, message: String) {
        tracing::error!("Audio stream error: {}", message);
        self.token.set(CancelReason::StreamFault(message));
    }
}

/// Handle keeping an input stream alive. Dropping it stops and closes the
/// stream.
pub trait StreamHandle {}

/// Platform audio layer seam.
///
/// The chunk sender is the producer side of the session's channel; each device
/// callback invocation must do only a non-blocking send and nothing else.
pub trait AudioBackend {
    /// Whether any input-capable device exists.
    fn has_input_device(&self) -> bool;

    /// Opens an i16 input stream bound to the configured rate and channel
    /// count and starts capturing.
    fn open_stream(
        &self,
        config: &CaptureConfig,
        chunks: Sender<Vec<i16>>,
        fault: FaultReporter,
    ) -> Result<Box<dyn StreamHandle>>;
}

/// Production backend capturing from a cpal input device.
pub struct CpalBackend {
    /// Device name, numeric index, or "default" for the system default.
    device_name: String,
}

struct CpalStream {
    _stream: cpal::Stream,
}

impl StreamHandle for CpalStream {}

impl CpalBackend {
    pub fn new(device_name: String) -> Self {
        Self { device_name }
    }

    fn device(&self) -> Result<cpal::Device> {
        suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })
    }
}

impl AudioBackend for CpalBackend {
    fn has_input_device(&self) -> bool {
        suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            let available = match host.input_devices() {
                Ok(mut devices) => devices.any(|d| d.default_input_config().is_ok()),
                Err(_) => false,
            };
            Ok(available)
        })
        .unwrap_or(false)
    }

    fn open_stream(
        &self,
        config: &CaptureConfig,
        chunks: Sender<Vec<i16>>,
        fault: FaultReporter,
    ) -> Result<Box<dyn StreamHandle>> {
        let device = self.device()?;

        let device_label = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_label);

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "Stream configuration: {}Hz, {} channels",
            config.sample_rate,
            config.channels
        );

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Producer side only. A send on an unbounded channel never
                // blocks the hardware capture thread; a send error means the
                // consumer is gone and the chunk can be dropped.
                let _ = chunks.send(data.to_vec());
            },
            move |err| {
                fault.report(err.to_string());
            },
            None,
        )?;

        stream.play()?;
        tracing::debug!("Audio stream started");

        Ok(Box::new(CpalStream { _stream: stream }))
    }
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If devices cannot be enumerated
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.into_iter().nth(index).unwrap());
        } else {
            return Err(anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                devices.len().saturating_sub(1)
            ));
        }
    }

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'audiomail list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
