//! Serial port backed channel.

use std::io::{self, Read, Write};
use std::time::Duration;

use digimesh_at::SerialChannel;
use serialport::{ClearBuffer, SerialPort};

use crate::error::*;

/// Read timeout for the underlying port. Reads only ask for bytes already
/// available, so this is a ceiling rather than a wait.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// First serial port reported by the OS.
pub fn find_port() -> DriverResult<String> {
    serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .next()
        .ok_or(DriverError::NoPortFound)
}

/// A module attached to a local serial port.
pub struct SerialPortChannel {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialPortChannel {
    /// Open `name` at `baud`, 8N1.
    pub fn open(name: &str, baud: u32) -> DriverResult<Self> {
        let port = serialport::new(name, baud)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()?;
        tracing::info!("opened {} at {} baud", name, baud);
        Ok(SerialPortChannel {
            name: name.to_string(),
            port,
        })
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SerialChannel for SerialPortChannel {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; available];
        let n = match self.port.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(e),
        };
        buf.truncate(n);
        Ok(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush_io(&mut self) -> io::Result<()> {
        self.port.flush()?;
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn reopen(&mut self, baud: u32) -> io::Result<()> {
        tracing::debug!("switching {} to {} baud", self.name, baud);
        self.port.set_baud_rate(baud)?;
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.port.baud_rate().unwrap_or_default()
    }
}
