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

use crate::loadcell::channel::CHANNEL_COUNT;
use embassy_time::Instant;
use heapless::{HistoryBuffer, Vec};

/// Largest magnitude of a 24 bit signed conversion, 2^23 - 1.
pub const FULL_SCALE: f32 = 8_388_607.0;

/// Total force (N) below which the centre of pressure is reported as zero.
pub const COP_MIN_TOTAL_FORCE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub raw: i32,
    /// Offset corrected code as a fraction of full scale
    pub normalized: f32,
    /// Newtons
    pub force: f32,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Statistics {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    pub count: u32,
}

impl Statistics {
    pub fn update(&mut self, value: f32) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.avg = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.avg += (value - self.avg) / (self.count as f32 + 1.0);
            // rounding must not push the mean outside the observed range
            self.avg = self.avg.clamp(self.min, self.max);
        }
        self.count = self.count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Median of the last `N` values pushed.
pub struct MedianFilter<const N: usize> {
    history: HistoryBuffer<f32, N>,
}

impl<const N: usize> MedianFilter<N> {
    pub const fn new() -> Self {
        Self {
            history: HistoryBuffer::new(),
        }
    }

    pub fn push(&mut self, value: f32) {
        self.history.write(value);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.len() == 0
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn median(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let mut sorted: Vec<f32, N> = self.history.as_slice().iter().copied().collect();
        sorted.sort_unstable_by(f32::total_cmp);
        Some(sorted[sorted.len() / 2])
    }
}

impl<const N: usize> Default for MedianFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean of the four channel values, the combined signal used for whole plate noise rejection.
pub fn quartered_sum(values: &[f32; CHANNEL_COUNT]) -> f32 {
    values.iter().sum::<f32>() / CHANNEL_COUNT as f32
}

/// Forces of one scan in plate layout order: front-left, front-right, rear-left, rear-right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ForceData {
    pub forces: [f32; CHANNEL_COUNT],
}

impl ForceData {
    pub fn total(&self) -> f32 {
        self.forces.iter().sum()
    }

    /// Right minus left over total, in [-1, 1] for non-negative loads.
    pub fn cop_x(&self) -> f32 {
        let [front_left, front_right, rear_left, rear_right] = self.forces;
        self.ratio_of_total((front_right + rear_right) - (front_left + rear_left))
    }

    /// Rear minus front over total.
    pub fn cop_y(&self) -> f32 {
        let [front_left, front_right, rear_left, rear_right] = self.forces;
        self.ratio_of_total((rear_left + rear_right) - (front_left + front_right))
    }

    fn ratio_of_total(&self, difference: f32) -> f32 {
        let total = self.total();
        if total < COP_MIN_TOTAL_FORCE {
            return 0.0;
        }
        difference / total
    }
}

/// One complete four channel scan.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub number: u32,
    pub timestamp: Instant,
    pub measurements: [Measurement; CHANNEL_COUNT],
}

impl Frame {
    pub fn force_data(&self) -> ForceData {
        ForceData {
            forces: self.measurements.map(|m| m.force),
        }
    }

    pub fn raw(&self) -> [i32; CHANNEL_COUNT] {
        self.measurements.map(|m| m.raw)
    }
}
