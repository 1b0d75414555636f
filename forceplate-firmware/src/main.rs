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

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Async, Phase, Polarity, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::PubSubChannel;
use embassy_sync::signal::Signal;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use forceplate::clock::SystemClock;
use forceplate::config::{AdcConfig, PlateConfig, SyncConfig};
use forceplate::loadcell::force_plate::ForcePlate;
use forceplate::loadcell::interface::ads1261::Ads1261;
use forceplate::loadcell::interface::data_ready::{forward_data_ready, SignalDataReady};
use forceplate::loadcell::manager::ForcePlateManager;
use forceplate::loadcell::messaging::{
    PlateEvent, PlateEventChannel, PlateEventPublisher, PlateEventSubscriber, PlateRequest,
    PlateRequestChannel, PlateRequestSubscriber,
};
use forceplate::loadcell::scanner::ChannelScanner;
#[allow(unused_imports)]
use {defmt_rtt as _, panic_probe as _};

static DATA_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static PLATE_REQUESTS: PlateRequestChannel = PubSubChannel::new();
static PLATE_EVENTS: PlateEventChannel = PubSubChannel::new();

const FRAMES_PER_LOG: u32 = 1000;

type AdcSpi = ExclusiveDevice<Spi<'static, SPI0, Async>, Output<'static>, Delay>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // ADS1261 samples on the falling clock edge, SPI mode 1
    let mut spi_config = spi::Config::default();
    spi_config.frequency = 8_000_000;
    spi_config.phase = Phase::CaptureOnSecondTransition;
    spi_config.polarity = Polarity::IdleLow;
    let bus = Spi::new(
        p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, p.DMA_CH0, p.DMA_CH1, spi_config,
    );
    let chip_select = Output::new(p.PIN_17, Level::High);
    let spi = ExclusiveDevice::new(bus, chip_select, Delay).unwrap();
    let drdy = Input::new(p.PIN_20, Pull::Up);

    spawner.spawn(data_ready_task(drdy)).unwrap();
    spawner
        .spawn(force_plate_task(
            spi,
            PLATE_REQUESTS.subscriber().unwrap(),
            PLATE_EVENTS.publisher().unwrap(),
        ))
        .unwrap();
    spawner
        .spawn(frame_log_task(PLATE_EVENTS.subscriber().unwrap()))
        .unwrap();

    PLATE_REQUESTS
        .publisher()
        .unwrap()
        .publish_immediate(PlateRequest::Start);
}

#[embassy_executor::task]
async fn data_ready_task(drdy: Input<'static>) {
    forward_data_ready(drdy, &DATA_READY).await
}

#[embassy_executor::task]
async fn force_plate_task(
    spi: AdcSpi,
    requests: PlateRequestSubscriber<'static>,
    events: PlateEventPublisher<'static>,
) {
    let timing = SyncConfig::default();
    let scanner = ChannelScanner::new(
        Ads1261::new(spi, Delay, timing.bus_timeout),
        SignalDataReady::new(&DATA_READY),
        Delay,
        timing,
    );
    let plate_config = PlateConfig::default();
    let plate = match ForcePlate::new(scanner, SystemClock, &AdcConfig::default(), plate_config).await {
        Ok(plate) => plate,
        Err(e) => {
            error!("ADC bring-up failed: {}", e.kind());
            return;
        }
    };

    let mut manager =
        ForcePlateManager::new(requests, events, plate, plate_config.min_sample_interval);
    manager.run().await;
}

#[embassy_executor::task]
async fn frame_log_task(mut events: PlateEventSubscriber<'static>) {
    loop {
        match events.next_message_pure().await {
            PlateEvent::Frame(frame) if frame.number % FRAMES_PER_LOG == 0 => {
                let data = frame.force_data();
                info!(
                    "Frame {}: total {} N, CoP ({}, {})",
                    frame.number,
                    data.total(),
                    data.cop_x(),
                    data.cop_y()
                );
            }
            PlateEvent::AcquisitionFailed(kind) => warn!("Acquisition failed: {}", kind),
            _ => {}
        }
    }
}
