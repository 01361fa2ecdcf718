use std::time::{Duration, Instant};

use log::{debug, error, info, trace};
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::config::{ConfigBases, TeleinfoMeterConfig};
use crate::mqtt::{publish_protocol_count, SubscribeData, Transmission};
use crate::{get_config_or_panic, CONFIG};

pub mod decoder;
pub mod group;
pub mod record;
#[cfg(feature = "serial")]
pub mod serial;
pub mod state;
pub mod structs;
pub mod utils;

pub use decoder::{DecoderStats, TeleinfoDecoder};
pub use record::TeleinfoRecord;

#[derive(Error, Debug)]
pub enum TeleinfoError {
    #[error("Unable to open serial port {0}")]
    SerialOpen(String),
    #[error("Serial read failed: {0}")]
    SerialRead(#[from] std::io::Error),
    #[error("Channel to the MQTT manager closed")]
    ChannelClosed,
    #[error("Frame carries no meter address")]
    MissingAddress,
    #[error("Tariff option '{0}' not known")]
    UnknownTariffOption(String),
}

/// Starts one reader per configured meter
pub struct TeleinfoManager {
    sender: Sender<Transmission>,
    meters: Vec<TeleinfoMeterConfig>,
    ha_enabled: bool,
}

impl TeleinfoManager {
    pub fn new(sender: Sender<Transmission>) -> Self {
        let meters = get_config_or_panic!("teleinfo", ConfigBases::Teleinfo);
        let mqtt = get_config_or_panic!("mqtt", ConfigBases::Mqtt);
        Self::with_config(sender, meters, mqtt.ha_enabled)
    }

    pub fn with_config(sender: Sender<Transmission>, meters: Vec<TeleinfoMeterConfig>, ha_enabled: bool) -> Self {
        Self { sender, meters, ha_enabled }
    }

    pub async fn start_thread(&mut self) {
        info!("Starting Teleinfo thread with {} meter(s)", self.meters.len());
        publish_protocol_count(&self.sender, "teleinfo", self.meters.len() as u32).await;

        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        for meter in self.meters.iter() {
            let reader = MeterReader::new(meter.clone(), self.sender.clone(), self.ha_enabled);
            let name = meter.name.clone();
            readers.push(tokio::spawn(async move {
                if let Err(e) = reader.run().await {
                    error!("Teleinfo meter {name} stopped: {e}");
                }
            }));
        }

        for reader in readers {
            let _ = reader.await;
        }
        info!("Teleinfo thread exit");
    }
}

/// Decodes the byte stream of one meter and publishes its frames
pub struct MeterReader {
    config: TeleinfoMeterConfig,
    sender: Sender<Transmission>,
    decoder: TeleinfoDecoder,
    last_publish: Option<Instant>,
    discovered: bool,
    ha_enabled: bool,
}

impl MeterReader {
    pub fn new(config: TeleinfoMeterConfig, sender: Sender<Transmission>, ha_enabled: bool) -> Self {
        Self {
            config,
            sender,
            decoder: TeleinfoDecoder::new(),
            last_publish: None,
            discovered: false,
            ha_enabled,
        }
    }

    /// Reads from the serial port, or from `teleinfo_input/<name>` when the
    /// meter has no port, until the byte source or the MQTT manager is gone.
    pub async fn run(mut self) -> Result<(), TeleinfoError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        match self.config.port.clone() {
            #[cfg(feature = "serial")]
            Some(port) => {
                tokio::spawn(serial::read_serial(self.config.clone(), port, tx));
            }
            #[cfg(not(feature = "serial"))]
            Some(port) => {
                return Err(TeleinfoError::SerialOpen(format!("{port}: serial support not built in")));
            }
            None => {
                let register = Transmission::Subscribe(SubscribeData {
                    topic: format!("teleinfo_input/{}", self.config.name),
                    sender: tx,
                });
                self.sender.send(register).await.map_err(|_| TeleinfoError::ChannelClosed)?;
            }
        }

        info!("Teleinfo meter {} waiting for data", self.config.name);
        while let Some(chunk) = rx.recv().await {
            self.handle_bytes(&chunk).await?;
        }

        Err(TeleinfoError::ChannelClosed)
    }

    pub async fn handle_bytes(&mut self, bytes: &[u8]) -> Result<(), TeleinfoError> {
        for record in self.decoder.feed(bytes) {
            self.handle_record(record).await?;
        }
        Ok(())
    }

    async fn handle_record(&mut self, record: TeleinfoRecord) -> Result<(), TeleinfoError> {
        if !self.should_publish(Instant::now()) {
            trace!("Skipping frame of {}, publish interval not reached", self.config.name);
            return Ok(());
        }

        if self.ha_enabled && !self.discovered {
            match utils::build_discovery(&self.config.name, &record) {
                Ok(disc) => {
                    self.sender.send(Transmission::AutoDiscovery(disc)).await
                        .map_err(|_| TeleinfoError::ChannelClosed)?;
                    self.discovered = true;
                }
                Err(e) => debug!("Discovery of {} postponed: {e}", self.config.name),
            }
        }

        let mr = utils::to_metering_data(&self.config.name, &record, &self.decoder.stats());
        self.sender.send(Transmission::Metering(mr)).await
            .map_err(|_| TeleinfoError::ChannelClosed)
    }

    fn should_publish(&mut self, now: Instant) -> bool {
        if self.config.publish_interval == 0 {
            return true;
        }

        match self.last_publish {
            Some(last) if now.duration_since(last) < Duration::from_secs(self.config.publish_interval) => false,
            _ => {
                self.last_publish = Some(now);
                true
            }
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}
