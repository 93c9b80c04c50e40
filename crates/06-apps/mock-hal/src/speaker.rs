//! Speaker output device with the production gain curve.

use device_abi::{DeviceConfigEntry, DeviceError, OutputDevice, OutputDeviceType, OutputHook};
use parking_lot::Mutex;
use std::sync::Arc;

/// Maps an integer volume (0..=100) onto the amplifier gain.
///
/// The polynomial keeps low levels audible while flattening the top of the
/// range: `gain = -0.0018·v³ + 0.028·v²` over `v = volume / 10`, so level
/// 100 lands exactly on gain 1.0.
pub fn volume_gain(volume: u32) -> f32 {
    debug_assert!(volume <= 100);
    let v = (volume / 10) as f32;
    -0.0018 * v.powi(3) + 0.028 * v.powi(2)
}

/// A speaker device carrying a runtime volume config.
pub struct MqsSpeaker {
    volume: Arc<Mutex<u32>>,
}

impl MqsSpeaker {
    /// A speaker at the default volume.
    pub fn new() -> Self {
        Self {
            volume: Arc::new(Mutex::new(60)),
        }
    }

    /// Current volume percentage.
    pub fn volume(&self) -> u32 {
        *self.volume.lock()
    }

    /// Sets the volume percentage (0..=100).
    pub fn set_volume(&self, volume: u32) -> Result<(), DeviceError> {
        if volume > 100 {
            return Err(DeviceError::op("volume out of range"));
        }
        *self.volume.lock() = volume;
        Ok(())
    }

    /// The amplifier gain at the current volume.
    pub fn gain(&self) -> f32 {
        volume_gain(self.volume())
    }
}

impl Default for MqsSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for MqsSpeaker {
    fn name(&self) -> &str {
        "mqs_audio"
    }

    fn device_type(&self) -> OutputDeviceType {
        OutputDeviceType::Audio
    }

    fn init(&mut self, _hook: OutputHook) -> Result<(), DeviceError> {
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn configs(&self) -> Vec<DeviceConfigEntry> {
        vec![DeviceConfigEntry {
            name: "volume".into(),
            value: self.volume(),
            description: "% volume of the speaker".into(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_curve_hits_the_reference_points() {
        // Level 10 (volume 100) is unity gain.
        assert!((volume_gain(100) - 1.0).abs() < 1e-6);
        // Level 1 (volume 10) is barely audible.
        assert!((volume_gain(10) - 0.0262).abs() < 1e-4);
        // Mute is silent.
        assert_eq!(volume_gain(0), 0.0);
    }

    #[test]
    fn gain_is_monotonic_over_the_levels() {
        let mut last = -1.0f32;
        for volume in (0..=100).step_by(10) {
            let gain = volume_gain(volume);
            assert!(gain > last, "gain must grow with volume");
            last = gain;
        }
    }

    #[test]
    fn volume_is_validated_and_reflected_in_configs() {
        let speaker = MqsSpeaker::new();
        speaker.set_volume(80).unwrap();
        assert!(speaker.set_volume(101).is_err());
        assert_eq!(speaker.configs()[0].value, 80);
        assert!((speaker.gain() - volume_gain(80)).abs() < 1e-6);
    }
}
