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

//! ADS1261 command set, register map and register field encodings.

use strum::{EnumCount, EnumIter};

pub const ADS1261_DEVICE_ID: u8 = 0b1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Nop = 0x00,
    Reset = 0x06,
    Start = 0x08,
    Stop = 0x0A,
    ReadData = 0x12,
    SystemOffsetCalibration = 0x16,
    GainCalibration = 0x17,
    SelfOffsetCalibration = 0x19,
    Lock = 0xF2,
    Unlock = 0xF5,
}

pub const READ_REGISTER_OPCODE: u8 = 0x20;
pub const WRITE_REGISTER_OPCODE: u8 = 0x40;

/// Documented register addresses. Anything outside this set cannot be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Id = 0x00,
    Status = 0x01,
    Mode0 = 0x02,
    Mode1 = 0x03,
    Mode2 = 0x04,
    Mode3 = 0x05,
    Ref = 0x06,
    OffsetCal0 = 0x07,
    OffsetCal1 = 0x08,
    OffsetCal2 = 0x09,
    FullScaleCal0 = 0x0A,
    FullScaleCal1 = 0x0B,
    FullScaleCal2 = 0x0C,
    Imux = 0x0D,
    Imag = 0x0E,
    Reserved = 0x0F,
    Pga = 0x10,
    InputMux = 0x11,
    InputBias = 0x12,
}

impl Register {
    pub fn address(self) -> u8 {
        self as u8
    }
}

/// Snapshot of every register, indexed by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterMap {
    values: [u8; Register::COUNT],
}

impl RegisterMap {
    pub fn get(&self, register: Register) -> u8 {
        self.values[register.address() as usize]
    }

    pub fn set(&mut self, register: Register, value: u8) {
        self.values[register.address() as usize] = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    Gain1,
    Gain2,
    Gain4,
    Gain8,
    Gain16,
    Gain32,
    Gain64,
    Gain128,
}

impl Gain {
    fn field(&self) -> u8 {
        match self {
            Gain::Gain1 => 0b000,
            Gain::Gain2 => 0b001,
            Gain::Gain4 => 0b010,
            Gain::Gain8 => 0b011,
            Gain::Gain16 => 0b100,
            Gain::Gain32 => 0b101,
            Gain::Gain64 => 0b110,
            Gain::Gain128 => 0b111,
        }
    }

    pub fn value(&self) -> f32 {
        (1u32 << self.field()) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    Sps2_5,
    Sps5,
    Sps10,
    Sps16_6,
    Sps20,
    Sps50,
    Sps60,
    Sps100,
    Sps400,
    Sps1200,
    Sps2400,
    Sps4800,
    Sps7200,
    Sps14400,
    Sps19200,
    Sps25600,
    Sps40000,
}

impl DataRate {
    fn field(&self) -> u8 {
        match self {
            DataRate::Sps2_5 => 0b00000,
            DataRate::Sps5 => 0b00001,
            DataRate::Sps10 => 0b00010,
            DataRate::Sps16_6 => 0b00011,
            DataRate::Sps20 => 0b00100,
            DataRate::Sps50 => 0b00101,
            DataRate::Sps60 => 0b00110,
            DataRate::Sps100 => 0b00111,
            DataRate::Sps400 => 0b01000,
            DataRate::Sps1200 => 0b01001,
            DataRate::Sps2400 => 0b01010,
            DataRate::Sps4800 => 0b01011,
            DataRate::Sps7200 => 0b01100,
            DataRate::Sps14400 => 0b01101,
            DataRate::Sps19200 => 0b01110,
            DataRate::Sps25600 => 0b01111,
            DataRate::Sps40000 => 0b10000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Filter {
    Sinc1,
    Sinc2,
    Sinc3,
    Sinc4,
    Fir,
}

impl Filter {
    fn field(&self) -> u8 {
        match self {
            Filter::Sinc1 => 0b000,
            Filter::Sinc2 => 0b001,
            Filter::Sinc3 => 0b010,
            Filter::Sinc4 => 0b011,
            Filter::Fir => 0b100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionMode {
    /// Free running conversions, restarted by the ADC on every input change
    Continuous,
    /// One conversion per START command
    Pulse,
}

/// Programmable delay between the conversion start and the first sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionDelay {
    None,
    Us50,
    Us59,
    Us67,
    Us85,
    Us119,
    Us189,
    Us328,
    Us605,
}

impl ConversionDelay {
    fn field(&self) -> u8 {
        match self {
            ConversionDelay::None => 0b0000,
            ConversionDelay::Us50 => 0b0001,
            ConversionDelay::Us59 => 0b0010,
            ConversionDelay::Us67 => 0b0011,
            ConversionDelay::Us85 => 0b0100,
            ConversionDelay::Us119 => 0b0101,
            ConversionDelay::Us189 => 0b0110,
            ConversionDelay::Us328 => 0b0111,
            ConversionDelay::Us605 => 0b1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reference {
    /// Internal 2.5 V reference
    Internal,
    /// Analog supply, ratiometric to the bridge excitation
    Avdd,
    /// External reference on AIN0 / AIN1
    External1,
    /// External reference on AIN2 / AIN3
    External2,
}

/// Differential input pins as encoded in the INPMUX register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogInput {
    AinCom,
    Ain(u8),
}

impl AnalogInput {
    fn field(&self) -> u8 {
        match self {
            AnalogInput::AinCom => 0b0000,
            AnalogInput::Ain(n) => (n & 0x0F) + 1,
        }
    }
}

pub fn mode0(data_rate: DataRate, filter: Filter) -> u8 {
    (data_rate.field() << 3) | filter.field()
}

pub fn mode1(mode: ConversionMode, delay: ConversionDelay) -> u8 {
    let convrt = match mode {
        ConversionMode::Continuous => 0,
        ConversionMode::Pulse => 1,
    };
    (convrt << 4) | delay.field()
}

pub fn mode3(spi_auto_timeout: bool) -> u8 {
    if spi_auto_timeout {
        1 << 4
    } else {
        0
    }
}

pub fn pga(gain: Gain) -> u8 {
    gain.field()
}

pub fn reference(reference: Reference) -> u8 {
    match reference {
        Reference::Internal => 1 << 4,
        Reference::Avdd => (0b01 << 2) | 0b01,
        Reference::External1 => (0b10 << 2) | 0b10,
        Reference::External2 => (0b11 << 2) | 0b11,
    }
}

pub fn input_mux(positive: AnalogInput, negative: AnalogInput) -> u8 {
    (positive.field() << 4) | negative.field()
}

pub fn device_id(id_register: u8) -> u8 {
    id_register >> 4
}

pub fn revision(id_register: u8) -> u8 {
    id_register & 0x0F
}
