//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::recording::audio::suppress_alsa_warnings;

/// One input device as shown to the user.
struct DeviceListing {
    index: usize,
    name: String,
    is_default: bool,
    config: Option<(u32, u16)>,
}

/// Lists all available audio input devices on the system.
///
/// The printed ID or name can be used as `audio.device` in the config.
///
/// # Errors
/// - If the audio host cannot enumerate its devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let listings = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?;

        // Devices whose name cannot be queried are skipped.
        let listings = devices
            .filter_map(|d| {
                let name = d.name().ok()?;
                let config = d
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels()));
                Some((name, config))
            })
            .enumerate()
            .map(|(index, (name, config))| DeviceListing {
                index,
                is_default: default_name.as_ref() == Some(&name),
                name,
                config,
            })
            .collect::<Vec<_>>();
        Ok::<_, anyhow::Error>(listings)
    })?;

    if listings.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!("Available audio input devices:");
    println!();
    for listing in &listings {
        print!("{}", format_listing(listing));
    }
    Ok(())
}

fn format_listing(listing: &DeviceListing) -> String {
    let default_indicator = if listing.is_default { " [DEFAULT]" } else { "" };
    let config_info = match listing.config {
        Some((sample_rate, channels)) => format!(" ({sample_rate}Hz, {channels} channels)"),
        None => " (configuration unavailable)".to_string(),
    };
    format!(
        "  ID: {}\n    Name: {}{}\n    Config:{}\n\n",
        listing.index, listing.name, default_indicator, config_info
    )
}
