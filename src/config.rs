// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::loadcell::interface::registers::{
    ConversionDelay, ConversionMode, DataRate, Filter, Gain, Reference,
};
use embassy_time::Duration;

/// Register level setup applied to the ADC at start up.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcConfig {
    pub gain: Gain,
    pub data_rate: DataRate,
    pub filter: Filter,
    pub conversion_mode: ConversionMode,
    pub conversion_delay: ConversionDelay,
    pub reference: Reference,
    pub spi_auto_timeout: bool,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            gain: Gain::Gain128,
            data_rate: DataRate::Sps40000,
            filter: Filter::Sinc1,
            conversion_mode: ConversionMode::Pulse,
            conversion_delay: ConversionDelay::Us50,
            reference: Reference::Avdd,
            spi_auto_timeout: true,
        }
    }
}

/// Timing of the conversion synchroniser and channel scanner.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncConfig {
    /// Upper bound on the wait for data ready
    pub data_ready_timeout: Duration,
    /// Analog front end settling after a multiplexer write
    pub mux_settle: Duration,
    /// Fixed wait used instead of data ready when no ready line is wired
    pub conversion_settle: Duration,
    /// Upper bound on a single bus transaction
    pub bus_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_ready_timeout: Duration::from_micros(2_000),
            mux_settle: Duration::from_micros(100),
            conversion_settle: Duration::from_micros(1_000),
            bus_timeout: Duration::from_millis(1),
        }
    }
}

/// Acquisition and calibration behaviour of the plate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlateConfig {
    /// Minimum spacing of gated reads, 1 kHz per channel floor for force platforms
    pub min_sample_interval: Duration,
    /// Smallest accepted magnitude for a span calibration reference force
    pub reference_force_floor: f32,
    /// Pause between consecutive samples of a calibration pass
    pub calibration_sample_interval: Duration,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            min_sample_interval: Duration::from_micros(1_000),
            reference_force_floor: 0.1,
            calibration_sample_interval: Duration::from_millis(10),
        }
    }
}
