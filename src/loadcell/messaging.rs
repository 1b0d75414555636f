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
use crate::loadcell::calibration::CalibrationState;
use crate::loadcell::channel::{ChannelId, ChannelSelect};
use crate::loadcell::interface::Diagnostic;
use crate::loadcell::processing::{Frame, Measurement, Statistics};
use crate::loadcell::ForcePlateSystem;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Publisher, Subscriber};

/// Commands for the plate owner. Channel numbers arrive as received from the command
/// interface and are validated by the manager.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlateRequest {
    Start,
    Stop,
    Tare { channel: u8, samples: u32 },
    Calibrate { channel: u8, reference_force: f32, samples: u32 },
    Read,
    ReadIfReady,
    ReadChannel(u8),
    GetStats(u8),
    /// Channel number or the all channels sentinel
    ResetStats(u8),
    /// Channel number or the all channels sentinel
    ResetCalibration(u8),
    GetCalibrationState(u8),
    Diagnostic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlateEvent {
    Completed(PlateRequest),
    Failed(PlateRequest, ErrorKind),
    /// Frame from the periodic acquisition
    Frame(Frame),
    /// Frame taken in answer to a `Read` or `ReadIfReady` request
    ReadReply(Frame),
    /// Gated read found the sample interval had not yet elapsed
    NotReady,
    ChannelMeasurement(ChannelId, Measurement),
    Stats(ChannelId, Statistics),
    CalibrationState(ChannelId, CalibrationState),
    Diagnostic(Diagnostic),
    /// Periodic acquisition scan failed
    AcquisitionFailed(ErrorKind),
}

const CHANNEL_DEPTH: usize = 10;
const CHANNEL_SUBS: usize = 2;
const CHANNEL_PUBS: usize = 2;

pub type PlateRequestChannel =
    PubSubChannel<CriticalSectionRawMutex, PlateRequest, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;
pub type PlateRequestSubscriber<'a> =
    Subscriber<'a, CriticalSectionRawMutex, PlateRequest, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;
pub type PlateRequestPublisher<'a> =
    Publisher<'a, CriticalSectionRawMutex, PlateRequest, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;

pub type PlateEventChannel =
    PubSubChannel<CriticalSectionRawMutex, PlateEvent, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;
pub type PlateEventSubscriber<'a> =
    Subscriber<'a, CriticalSectionRawMutex, PlateEvent, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;
pub type PlateEventPublisher<'a> =
    Publisher<'a, CriticalSectionRawMutex, PlateEvent, CHANNEL_DEPTH, CHANNEL_SUBS, CHANNEL_PUBS>;

/// Client side of the plate for tasks that do not own it. Each call drops events left over
/// from earlier traffic before publishing its request, and reads only accept `ReadReply`.
pub struct ForcePlateOverChannel<'a> {
    request_tx: PlateRequestPublisher<'a>,
    event_rx: PlateEventSubscriber<'a>,
}

impl<'a> ForcePlateOverChannel<'a> {
    pub fn new(request_tx: PlateRequestPublisher<'a>, event_rx: PlateEventSubscriber<'a>) -> Self {
        Self {
            request_tx,
            event_rx,
        }
    }

    fn discard_pending(&mut self) {
        while self.event_rx.try_next_message_pure().is_some() {}
    }

    async fn get_result(&mut self, request: PlateRequest) -> Result<(), ErrorKind> {
        self.discard_pending();
        self.request_tx.publish_immediate(request);
        loop {
            match self.event_rx.next_message_pure().await {
                PlateEvent::Completed(done) if done == request => return Ok(()),
                PlateEvent::Failed(failed, e) if failed == request => return Err(e),
                _ => {}
            }
        }
    }

    /// Publishes `request` and waits for the first event `accept` maps to a value, or for the
    /// failure of `request`.
    async fn get_reply<T>(
        &mut self,
        request: PlateRequest,
        accept: impl Fn(PlateEvent) -> Option<T>,
    ) -> Result<T, ErrorKind> {
        self.discard_pending();
        self.request_tx.publish_immediate(request);
        loop {
            let event = self.event_rx.next_message_pure().await;
            if let PlateEvent::Failed(failed, e) = event {
                if failed == request {
                    return Err(e);
                }
            } else if let Some(reply) = accept(event) {
                return Ok(reply);
            }
        }
    }
}

impl ForcePlateSystem for ForcePlateOverChannel<'_> {
    type Error = ErrorKind;

    async fn start(&mut self) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::Start).await
    }

    async fn stop(&mut self) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::Stop).await
    }

    async fn tare(&mut self, channel: ChannelId, samples: u32) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::Tare {
            channel: channel as u8,
            samples,
        })
        .await
    }

    async fn calibrate(
        &mut self,
        channel: ChannelId,
        reference_force: f32,
        samples: u32,
    ) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::Calibrate {
            channel: channel as u8,
            reference_force,
            samples,
        })
        .await
    }

    async fn read(&mut self) -> Result<Frame, Self::Error> {
        self.get_reply(PlateRequest::Read, |event| match event {
            PlateEvent::ReadReply(frame) => Some(frame),
            _ => None,
        })
        .await
    }

    async fn read_if_ready(&mut self) -> Result<Option<Frame>, Self::Error> {
        self.get_reply(PlateRequest::ReadIfReady, |event| match event {
            PlateEvent::ReadReply(frame) => Some(Some(frame)),
            PlateEvent::NotReady => Some(None),
            _ => None,
        })
        .await
    }

    async fn read_channel(&mut self, channel: ChannelId) -> Result<Measurement, Self::Error> {
        self.get_reply(PlateRequest::ReadChannel(channel as u8), |event| match event {
            PlateEvent::ChannelMeasurement(id, measurement) if id == channel => Some(measurement),
            _ => None,
        })
        .await
    }

    async fn get_stats(&mut self, channel: ChannelId) -> Result<Statistics, Self::Error> {
        self.get_reply(PlateRequest::GetStats(channel as u8), |event| match event {
            PlateEvent::Stats(id, stats) if id == channel => Some(stats),
            _ => None,
        })
        .await
    }

    async fn reset_stats(&mut self, select: ChannelSelect) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::ResetStats(select.raw())).await
    }

    async fn reset_calibration(&mut self, select: ChannelSelect) -> Result<(), Self::Error> {
        self.get_result(PlateRequest::ResetCalibration(select.raw()))
            .await
    }

    async fn get_calibration_state(
        &mut self,
        channel: ChannelId,
    ) -> Result<CalibrationState, Self::Error> {
        self.get_reply(
            PlateRequest::GetCalibrationState(channel as u8),
            |event| match event {
                PlateEvent::CalibrationState(id, state) if id == channel => Some(state),
                _ => None,
            },
        )
        .await
    }

    async fn diagnostic(&mut self) -> Result<Diagnostic, Self::Error> {
        self.get_reply(PlateRequest::Diagnostic, |event| match event {
            PlateEvent::Diagnostic(diagnostic) => Some(diagnostic),
            _ => None,
        })
        .await
    }
}
