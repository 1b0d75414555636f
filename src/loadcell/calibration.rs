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

//! Per channel tare and span calibration. Scale is expressed in newtons per raw code, so a
//! calibrated force is `(raw - offset) * scale`.

use crate::error::Error;
use crate::loadcell::processing::FULL_SCALE;
use micromath::F32Ext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationState {
    Uncalibrated,
    TareDone,
    Calibrated,
}

/// Why a span calibration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    NotTared,
    ReferenceBelowFloor,
    ZeroDelta,
}

impl<AdcE> From<CalibrationError> for Error<AdcE> {
    fn from(e: CalibrationError) -> Self {
        match e {
            CalibrationError::NotTared => Error::InvalidCalibrationState,
            CalibrationError::ReferenceBelowFloor => Error::InvalidCalibrationInput,
            CalibrationError::ZeroDelta => Error::ZeroDelta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    /// Zero load reading in raw codes
    pub offset: f32,
    /// Newtons per raw code
    pub scale: f32,
    pub state: CalibrationState,
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
            state: CalibrationState::Uncalibrated,
        }
    }
}

impl CalibrationRecord {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply_tare(&mut self, offset: f32) {
        self.offset = offset;
        self.state = CalibrationState::TareDone;
    }

    /// Checked before any sample is taken so a refused span costs no conversions.
    pub fn check_span_preconditions(
        &self,
        reference_force: f32,
        force_floor: f32,
    ) -> Result<(), CalibrationError> {
        if self.state != CalibrationState::TareDone {
            return Err(CalibrationError::NotTared);
        }
        if !(reference_force.is_finite() && reference_force.abs() >= force_floor) {
            return Err(CalibrationError::ReferenceBelowFloor);
        }
        Ok(())
    }

    /// Derives the scale from the mean loaded reading and commits it. On error nothing changes.
    pub fn apply_span(&mut self, reference_force: f32, loaded_mean: f32) -> Result<f32, CalibrationError> {
        let delta = loaded_mean - self.offset;
        if delta == 0.0 {
            return Err(CalibrationError::ZeroDelta);
        }
        self.scale = reference_force / delta;
        self.state = CalibrationState::Calibrated;
        Ok(self.scale)
    }

    pub fn normalized(&self, raw: i32) -> f32 {
        (raw as f32 - self.offset) / FULL_SCALE
    }

    pub fn force(&self, raw: i32) -> f32 {
        (raw as f32 - self.offset) * self.scale
    }
}

/// Running mean and spread of the raw codes taken during a calibration pass (Welford update).
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleAccumulator {
    mean: f64,
    squared_deviation: f64,
    count: u32,
}

impl SampleAccumulator {
    pub fn push(&mut self, raw: i32) {
        let raw = raw as f64;
        self.count += 1;
        let delta = raw - self.mean;
        self.mean += delta / self.count as f64;
        self.squared_deviation += delta * (raw - self.mean);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        Some(self.mean as f32)
    }

    /// Population standard deviation of the pass, in raw codes.
    pub fn std_dev(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let variance = self.squared_deviation / self.count as f64;
        if variance <= 0.0 {
            return Some(0.0);
        }
        // micromath's estimate is within ~5%, two Newton steps bring it to f32 precision
        let mut root = (variance as f32).sqrt() as f64;
        for _ in 0..2 {
            root = 0.5 * (root + variance / root);
        }
        Some(root as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_identity() {
        let mut record = CalibrationRecord {
            offset: 1200.0,
            scale: 0.02,
            state: CalibrationState::Calibrated,
        };
        record.reset();
        assert_eq!(record.offset, 0.0);
        assert_eq!(record.scale, 1.0);
        assert_eq!(record.state, CalibrationState::Uncalibrated);
    }

    #[test]
    fn span_requires_tare() {
        for state in [CalibrationState::Uncalibrated, CalibrationState::Calibrated] {
            let record = CalibrationRecord {
                state,
                ..CalibrationRecord::default()
            };
            assert_eq!(
                record.check_span_preconditions(100.0, 0.1),
                Err(CalibrationError::NotTared)
            );
        }
    }

    #[test]
    fn span_rejects_reference_below_floor() {
        let mut record = CalibrationRecord::default();
        record.apply_tare(10.0);
        assert_eq!(
            record.check_span_preconditions(-0.05, 0.1),
            Err(CalibrationError::ReferenceBelowFloor)
        );
        assert_eq!(record.check_span_preconditions(-50.0, 0.1), Ok(()));
    }

    #[test]
    fn span_rejects_non_finite_reference() {
        let mut record = CalibrationRecord::default();
        record.apply_tare(10.0);
        for force in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(
                record.check_span_preconditions(force, 0.1),
                Err(CalibrationError::ReferenceBelowFloor)
            );
        }
        assert_eq!(record.state, CalibrationState::TareDone);
    }

    #[test]
    fn span_sets_scale_from_delta() {
        let mut record = CalibrationRecord::default();
        record.apply_tare(1000.0);
        assert_eq!(record.apply_span(100.0, 1500.0), Ok(0.2));
        assert_eq!(record.state, CalibrationState::Calibrated);
        assert_eq!(record.force(1500), 100.0);
    }

    #[test]
    fn zero_delta_leaves_record_unchanged() {
        let mut record = CalibrationRecord::default();
        record.apply_tare(1000.0);
        let before = record;
        assert_eq!(record.apply_span(100.0, 1000.0), Err(CalibrationError::ZeroDelta));
        assert_eq!(record, before);
    }

    #[test]
    fn reading_at_offset_is_zero_force() {
        let record = CalibrationRecord {
            offset: -4321.0,
            scale: 37.5,
            state: CalibrationState::Calibrated,
        };
        assert_eq!(record.force(-4321), 0.0);
        assert_eq!(record.normalized(-4321), 0.0);
    }

    #[test]
    fn accumulator_mean_is_exact_for_constant_input() {
        let mut acc = SampleAccumulator::default();
        for _ in 0..250 {
            acc.push(-8_388_607);
        }
        assert_eq!(acc.mean(), Some(-8_388_607.0));
        assert_eq!(acc.std_dev(), Some(0.0));
        assert_eq!(SampleAccumulator::default().mean(), None);
    }

    #[test]
    fn accumulator_handles_long_full_scale_pass() {
        let mut acc = SampleAccumulator::default();
        for _ in 0..131_073 {
            acc.push(-8_388_608);
        }
        assert_eq!(acc.count(), 131_073);
        assert_eq!(acc.mean(), Some(-8_388_608.0));
        assert_eq!(acc.std_dev(), Some(0.0));
    }

    #[test]
    fn accumulator_spread_of_two_levels() {
        let mut acc = SampleAccumulator::default();
        for raw in [90, 110, 90, 110] {
            acc.push(raw);
        }
        assert_eq!(acc.mean(), Some(100.0));
        let spread = acc.std_dev().unwrap();
        assert!((spread - 10.0).abs() < 0.1);
    }
}
