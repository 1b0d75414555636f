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

use crate::error::ErrorKind;
use crate::loadcell::calibration::CalibrationRecord;
use crate::loadcell::interface::registers::AnalogInput;
use crate::loadcell::processing::{Measurement, Statistics};
use strum::{EnumCount, EnumIter};

pub const CHANNEL_COUNT: usize = ChannelId::COUNT;

/// Raw selector value meaning every channel.
pub const ALL_CHANNELS: u8 = 4;

/// One of the four load cells, numbered in plate layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelId {
    Ch0,
    Ch1,
    Ch2,
    Ch3,
}

impl ChannelId {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Ch0 => "front-left",
            ChannelId::Ch1 => "front-right",
            ChannelId::Ch2 => "rear-left",
            ChannelId::Ch3 => "rear-right",
        }
    }

    /// Differential pin pair of the channel: AIN(2i) positive, AIN(2i+1) negative.
    pub fn inputs(self) -> (AnalogInput, AnalogInput) {
        let positive = 2 * self as u8;
        (AnalogInput::Ain(positive), AnalogInput::Ain(positive + 1))
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = ErrorKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelId::Ch0),
            1 => Ok(ChannelId::Ch1),
            2 => Ok(ChannelId::Ch2),
            3 => Ok(ChannelId::Ch3),
            _ => Err(ErrorKind::InvalidArgument),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelect {
    One(ChannelId),
    All,
}

impl ChannelSelect {
    /// Numeric form used on command interfaces, [`ALL_CHANNELS`] for every channel.
    pub fn raw(&self) -> u8 {
        match self {
            ChannelSelect::One(channel) => *channel as u8,
            ChannelSelect::All => ALL_CHANNELS,
        }
    }

    pub fn includes(&self, channel: ChannelId) -> bool {
        match self {
            ChannelSelect::One(selected) => *selected == channel,
            ChannelSelect::All => true,
        }
    }
}

impl From<ChannelId> for ChannelSelect {
    fn from(channel: ChannelId) -> Self {
        ChannelSelect::One(channel)
    }
}

impl TryFrom<u8> for ChannelSelect {
    type Error = ErrorKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value == ALL_CHANNELS {
            Ok(ChannelSelect::All)
        } else {
            ChannelId::try_from(value).map(ChannelSelect::One)
        }
    }
}

/// Per channel state owned by the plate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub calibration: CalibrationRecord,
    pub statistics: Statistics,
    pub last_measurement: Option<Measurement>,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            calibration: CalibrationRecord::default(),
            statistics: Statistics::default(),
            last_measurement: None,
        }
    }
}
