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

pub mod ads1261;
pub mod data_ready;
pub mod registers;

use crate::config::AdcConfig;
use registers::AnalogInput;

/// Result of a communication self test against the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostic {
    pub device_id: u8,
    pub revision: u8,
    pub status: u8,
    pub id_recognised: bool,
    pub register_echo_ok: bool,
}

impl Diagnostic {
    pub fn passed(&self) -> bool {
        self.id_recognised && self.register_echo_ok
    }
}

pub trait AsyncMultiplexedAdc {
    type Error;

    /// Reset the converter and apply the register configuration. Leaves the device ready to
    /// accept input selections.
    async fn initialize(&mut self, config: &AdcConfig) -> Result<(), Self::Error>;

    /// Route a differential input pair to the modulator
    async fn select_input(
        &mut self,
        positive: AnalogInput,
        negative: AnalogInput,
    ) -> Result<(), Self::Error>;

    /// Trigger a single conversion (pulse mode) or restart the conversion cycle
    async fn start_conversion(&mut self) -> Result<(), Self::Error>;

    /// Read the latest conversion result, sign extended to 32 bits. The caller must have waited
    /// for the conversion to complete.
    async fn read_conversion(&mut self) -> Result<i32, Self::Error>;

    /// Check communication with the device without disturbing its configuration
    async fn diagnostic(&mut self) -> Result<Diagnostic, Self::Error>;

    /// Return the number of bits supported by the ADC
    fn get_adc_bit_count(&self) -> usize;
}
