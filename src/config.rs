//! Processing settings for the dispersion filter and the mute-window picker.
//!
//! Settings are plain serde structs and are persisted with `preferences` under `APP_INFO`.

use crate::io::Endianness;
use preferences::{AppInfo, Preferences};
use serde::{Deserialize, Serialize};

pub const APP_INFO: AppInfo = AppInfo {
    name: "Seismic Mute",
    author: "Linus Leo Stöckli",
};

const PREFS_KEY: &str = "config/processing";

/// Parameters of the circular wavenumber filter.
///
/// `d` is the spatial step of both grid axes, `kl` and `kh` are the inner and outer taper radii
/// in radians per unit distance.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct DispersionSettings {
    pub d: f64,
    pub kl: f64,
    pub kh: f64,
}

impl Default for DispersionSettings {
    fn default() -> Self {
        DispersionSettings {
            d: 5.0,
            kl: 0.35,
            kh: 0.55,
        }
    }
}

/// Parameters of the mute-window picker.
///
/// # Fields
/// - `nx`: Maximum number of receivers per shot.
/// - `ntfft`: Padded trace length of the shot buffer, at least the number of samples per trace.
/// - `hw`: Half width, in samples, of the search window around the previous pick.
/// - `endianness`: Byte order of the trace records.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct PickerSettings {
    pub nx: usize,
    pub ntfft: usize,
    pub hw: usize,
    pub endianness: Endianness,
}

impl Default for PickerSettings {
    fn default() -> Self {
        PickerSettings {
            nx: 512,
            ntfft: 1024,
            hw: 8,
            endianness: Endianness::Little,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct ProcessingSettings {
    pub dispersion: DispersionSettings,
    pub picker: PickerSettings,
}

impl ProcessingSettings {
    pub fn new() -> ProcessingSettings {
        ProcessingSettings::default()
    }

    /// Loads the stored settings, or stores and returns the defaults if there are none.
    pub fn load_or_default() -> ProcessingSettings {
        match ProcessingSettings::load(&APP_INFO, PREFS_KEY) {
            Ok(settings) => settings,
            Err(err) => {
                log::info!("no stored processing settings ({err}), using defaults");
                let settings = ProcessingSettings::new();
                if let Err(err) = settings.store() {
                    log::error!("error in saving processing settings: {err:?}");
                }
                settings
            }
        }
    }

    pub fn store(&self) -> Result<(), preferences::PreferencesError> {
        self.save(&APP_INFO, PREFS_KEY)
    }
}
