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

use core::fmt;

/// Failure reported by the register protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<SpiE> {
    /// The SPI peripheral reported an error for the transaction
    Spi(SpiE),
    /// The transaction did not complete within the bus timeout
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<AdcE> {
    /// A bus transaction with the ADC failed or timed out
    Communication(AdcE),
    /// Data ready was not asserted within the conversion timeout
    ConversionTimeout,
    /// Channel index or sample count out of range
    InvalidArgument,
    /// Span calibration attempted before a completed tare
    InvalidCalibrationState,
    /// Mean calibration reading did not move away from the tare offset
    ZeroDelta,
    /// Reference force is below the noise floor
    InvalidCalibrationInput,
}

/// Payload free version of [`Error`], small enough to be carried on channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Communication,
    ConversionTimeout,
    InvalidArgument,
    InvalidCalibrationState,
    ZeroDelta,
    InvalidCalibrationInput,
}

impl<AdcE> Error<AdcE> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Communication(_) => ErrorKind::Communication,
            Error::ConversionTimeout => ErrorKind::ConversionTimeout,
            Error::InvalidArgument => ErrorKind::InvalidArgument,
            Error::InvalidCalibrationState => ErrorKind::InvalidCalibrationState,
            Error::ZeroDelta => ErrorKind::ZeroDelta,
            Error::InvalidCalibrationInput => ErrorKind::InvalidCalibrationInput,
        }
    }
}

impl<AdcE> From<Error<AdcE>> for ErrorKind {
    fn from(e: Error<AdcE>) -> Self {
        e.kind()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::Communication => "ADC communication failed",
            ErrorKind::ConversionTimeout => "conversion did not complete in time",
            ErrorKind::InvalidArgument => "argument out of range",
            ErrorKind::InvalidCalibrationState => "channel must be tared before span calibration",
            ErrorKind::ZeroDelta => "calibration reading equals tare offset",
            ErrorKind::InvalidCalibrationInput => "reference force below noise floor",
        };
        f.write_str(text)
    }
}
