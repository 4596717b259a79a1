//! List available cameras and audio input devices.

use crate::capture;

/// Lists the cameras and audio inputs visible to duorec.
///
/// # Errors
/// - If neither the camera nor the audio backend can be queried
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let listing = capture::list_devices()?;

    println!();
    println!("Cameras:");
    if listing.cameras.is_empty() {
        println!("  none found");
    }
    for camera in &listing.cameras {
        println!("  ID: {}", camera.index);
        println!("    Name: {}", camera.name);
        if !camera.description.is_empty() {
            println!("    Description: {}", camera.description);
        }
    }

    println!();
    println!("Audio input devices:");
    if listing.microphones.is_empty() {
        println!("  none found");
    }
    for microphone in &listing.microphones {
        let default_indicator = if microphone.is_default { " [DEFAULT]" } else { "" };
        let config_info = match microphone.default_config {
            Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
            None => "configuration unavailable".to_string(),
        };
        println!("  {}{}", microphone.name, default_indicator);
        println!("    Config: {config_info}");
    }
    println!();
    println!("duorec records from the camera set as capture.camera_index in the config");
    println!("and from the default audio input.");

    Ok(())
}
