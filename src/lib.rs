//! Wavenumber dispersion filtering and mute-window picking for seismic shot records.
//!
//! The crate holds two independent building blocks of a redatuming workflow:
//!
//! * [`filters::dispersion`] mutes energy outside a circular band in the 2D wavenumber domain,
//!   running on any [`filters::transform::SpectralTransform2D`] backend.
//! * [`picking`] scans a stream of trace records shot by shot and picks, per receiver, the
//!   sample that defines the time-domain mute window.

pub mod config;
pub mod data_container;
pub mod filters;
pub mod io;
pub mod math_tools;
pub mod picking;

pub use config::{DispersionSettings, PickerSettings, ProcessingSettings};
pub use data_container::{MuteWindowTable, ShotGather, ShotWindow};
pub use filters::dispersion::{k1k2_circular_filter, DispersionFilter, WavenumberGrid};
pub use filters::transform::{Normalization, RealFft2d, SpectralTransform2D};
pub use filters::FilterError;
pub use io::{Endianness, TraceHeader, TraceReader};
pub use picking::{GeometryError, PickError, ShotWindowPicker};
