//! Output device discovery and stream config selection.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::{PlayerError, Result};

/// Pick an output device by case-insensitive substring, or the host default.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) {
        let devices = host
            .output_devices()
            .map_err(|e| PlayerError::Output(format!("enumerate devices: {e}")))?;
        for d in devices {
            let matched = d
                .description()
                .map(|desc| matches_device_name(&desc.name(), needle))
                .unwrap_or(false);
            if matched {
                return Ok(d);
            }
        }
        return Err(PlayerError::Output(format!("no output device matched: {needle}")));
    }

    host.default_output_device()
        .ok_or_else(|| PlayerError::Output("no default output device".into()))
}

/// Choose a supported config that runs at exactly `rate` Hz.
///
/// Ranges with `channels` channels win; otherwise any range at the rate is
/// accepted and the stream callback maps channels. Among equals, the sample
/// format closest to `f32` wins. Fails when no range covers the rate: there is
/// no resampling stage.
pub fn pick_output_config(
    device: &cpal::Device,
    rate: u32,
    channels: u16,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| PlayerError::Output(format!("query output configs: {e}")))?;

    let mut best: Option<(bool, u8, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        if rate < range.min_sample_rate() || rate > range.max_sample_rate() {
            continue;
        }
        let exact = range.channels() == channels;
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_exact, b_rank, _)) => is_better_candidate(exact, rank, *b_exact, *b_rank),
        };
        if replace {
            best = Some((exact, rank, range));
        }
    }

    best.map(|(_, _, range)| range.with_sample_rate(rate))
        .ok_or_else(|| PlayerError::Output(format!("device cannot run at {rate} Hz")))
}

/// Prefer a small fixed buffer so pause and seek take effect quickly.
///
/// Returns `None` when the device only reports its default size.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    const TARGET_FRAMES: u32 = 1_024;
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            let chosen = TARGET_FRAMES.min(*max).max(*min);
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Names of all output devices on the default host.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| PlayerError::Output(format!("enumerate devices: {e}")))?;
    Ok(devices
        .filter_map(|d| d.description().ok().map(|desc| desc.to_string()))
        .collect())
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(exact: bool, rank: u8, best_exact: bool, best_rank: u8) -> bool {
    if exact != best_exact {
        exact
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}
