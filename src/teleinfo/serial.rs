use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::Sender;
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};

use crate::config::TeleinfoMeterConfig;

use super::TeleinfoError;

const READ_BUFFER_SIZE: usize = 256;

/// Opens a serial port with the Teleinfo line settings (7E1)
pub fn open_port(port: &str, baud_rate: u32) -> Result<SerialStream, TeleinfoError> {
    let builder = tokio_serial::new(port, baud_rate)
        .data_bits(DataBits::Seven)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None);

    SerialStream::open(&builder)
        .map_err(|e| TeleinfoError::SerialOpen(format!("{port}: {e}")))
}

/// Reads the meter port forever and forwards every received chunk.
///
/// A failing port is reopened after `reopen_delay` seconds. Returns only
/// once the receiving side of `sender` is gone.
pub async fn read_serial(config: TeleinfoMeterConfig, port: String, sender: Sender<Vec<u8>>) -> TeleinfoError {
    loop {
        let result = match open_port(&port, config.baud_rate) {
            Ok(stream) => {
                info!("Teleinfo port {port} opened for {}", config.name);
                read_until_error(stream, &config, &sender).await
            }
            Err(e) => Err(e),
        };

        match result {
            Err(TeleinfoError::ChannelClosed) => return TeleinfoError::ChannelClosed,
            Err(e) => error!("Teleinfo meter {}: {e}", config.name),
            Ok(()) => {}
        }

        debug!("Reopening {port} in {}s", config.reopen_delay);
        tokio::time::sleep(Duration::from_secs(config.reopen_delay)).await;
    }
}

async fn read_until_error(
    mut stream: SerialStream,
    config: &TeleinfoMeterConfig,
    sender: &Sender<Vec<u8>>,
) -> Result<(), TeleinfoError> {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = match config.stall_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => {
                    warn!("No Teleinfo data from {} for {}s", config.name, config.read_timeout);
                    continue;
                }
            },
            None => stream.read(&mut buf).await?,
        };

        if read == 0 {
            return Err(TeleinfoError::SerialRead(std::io::ErrorKind::UnexpectedEof.into()));
        }

        sender.send(buf[..read].to_vec()).await
            .map_err(|_| TeleinfoError::ChannelClosed)?;
    }
}
