//! The module facade.
//!
//! [`MeshModule`] owns the serial channel and the state shared between the
//! thread that sends commands and the read loop. Each piece of shared state
//! sits behind its own lock:
//!
//! - `port` then `session` for command mode
//! - `reassembler` then `registers` for a read pass
//!
//! No path holds a lock from one pair while taking one from the other, except
//! `port` alone being taken briefly to read or write bytes.

use std::sync::Arc;
use std::time::Duration;

use digimesh_api::*;
use digimesh_at::{Clock, CommandModeSession, SerialChannel, SystemClock};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ModuleConfig, TRACKED_REGISTERS};
use crate::error::*;
use crate::raw_log::RawLog;
use crate::serial::{find_port, SerialPortChannel};
use crate::telemetry::metric_defs;

/// Default payload size of a link quality test, in bytes.
pub const DEFAULT_LINK_TEST_PAYLOAD: u16 = 0x20;

/// Default number of link quality test packets.
pub const DEFAULT_LINK_TEST_ITERATIONS: u16 = 200;

/// Payload of a trace route probe.
const TRACE_ROUTE_DATA: [u8; 3] = [1, 2, 3];

/// Pause between the two input flushes before programming.
const STARTUP_SETTLE: Duration = Duration::from_millis(200);

/// Who to ask for neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborTarget {
    /// This module.
    Local,
    /// Every node; refused, the module cannot ask a broadcast address.
    Global,
    /// A specific node.
    Address(Address64),
}

/// A DigiMesh module on a serial line.
pub struct MeshModule {
    port: Mutex<Box<dyn SerialChannel>>,
    session: Mutex<CommandModeSession>,
    registers: Mutex<ModuleRegisters>,
    reassembler: Mutex<FrameReassembler>,
    raw_log: RawLog,
    config: ModuleConfig,
    clock: Arc<dyn Clock>,
}

impl MeshModule {
    /// Open the configured (or first available) serial port and initialize
    /// the module.
    pub fn open(config: ModuleConfig) -> DriverResult<Self> {
        let port_name = match &config.port {
            Some(name) => name.clone(),
            None => find_port()?,
        };
        let channel = SerialPortChannel::open(&port_name, config.baud)?;
        let raw_log = match &config.log_dir {
            Some(dir) => RawLog::create(dir)?,
            None => RawLog::disabled(),
        };
        let module = MeshModule::new(Box::new(channel), config, Arc::new(SystemClock), raw_log);
        module.initialize()?;
        Ok(module)
    }

    /// Wrap an already open channel. Nothing is sent until [`initialize`](Self::initialize).
    pub fn new(
        channel: Box<dyn SerialChannel>,
        config: ModuleConfig,
        clock: Arc<dyn Clock>,
        raw_log: RawLog,
    ) -> Self {
        let session = CommandModeSession::new(clock.clone(), config.session_timing());
        let mut registers = ModuleRegisters::new();
        registers.set("AP", format!("{:02x}", config.api_mode().code()));
        MeshModule {
            port: Mutex::new(channel),
            session: Mutex::new(session),
            registers: Mutex::new(registers),
            reassembler: Mutex::new(FrameReassembler::new()),
            raw_log,
            config,
            clock,
        }
    }

    /// Program the configured registers and read back the tracked ones.
    ///
    /// Fails with an unreachable error when the module does not answer at
    /// any baud rate.
    pub fn initialize(&self) -> DriverResult<()> {
        {
            let mut port = self.port.lock();
            port.flush_io()?;
            self.clock.sleep(STARTUP_SETTLE);
            port.flush_io()?;
        }

        info!(
            "Programming XBee for type: {}, mode: {}, NetworkID: {:x}",
            self.config.node_type_name(),
            self.config.api_mode(),
            self.config.network_id
        );
        let baud = self.program_registers(&self.config.programmed_registers())?;
        debug!("module running at {} baud", baud);

        for &(name, width) in TRACKED_REGISTERS {
            match self.read_command_mode_register(name)? {
                Some(value) => {
                    let padded = format!("{:0>width$}", value, width = width);
                    info!("\tRegistry '{}': '0x{}'", name, padded);
                    self.registers.lock().set(name, &padded);
                }
                None => warn!("registry '{}' could not be read", name),
            }
        }

        self.reassembler.lock().clear();
        info!("initialization complete");
        Ok(())
    }

    /// Configuration the module was opened with.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Snapshot of the known register values.
    pub fn registers(&self) -> ModuleRegisters {
        self.registers.lock().clone()
    }

    /// Last known value of one register.
    pub fn register(&self, name: &str) -> Option<String> {
        self.registers.lock().get(name).map(str::to_string)
    }

    /// API mode from the AP register.
    pub fn api_mode(&self) -> ApiMode {
        self.registers.lock().api_mode()
    }

    /// This module's address, once SH/SL have been read.
    pub fn local_address(&self) -> Option<Address64> {
        self.registers.lock().local_address()
    }

    /// Bytes waiting in the receive buffer.
    pub fn buffered_len(&self) -> usize {
        self.reassembler.lock().buffered_len()
    }

    /// Raw log of this session.
    pub fn raw_log(&self) -> &RawLog {
        &self.raw_log
    }

    // ========================================================================
    // Command mode
    // ========================================================================

    /// Write registers in command mode, apply and persist them. Returns the
    /// baud rate the channel ends at.
    pub fn program_registers(&self, registers: &[(String, String)]) -> DriverResult<u32> {
        let mut port = self.port.lock();
        let mut session = self.session.lock();
        Ok(session.program_registers(&mut **port, registers, self.config.baud)?)
    }

    /// Read one register in command mode, as lowercase hex text.
    pub fn read_command_mode_register(&self, name: &str) -> DriverResult<Option<String>> {
        let mut port = self.port.lock();
        let mut session = self.session.lock();
        let reply = session.read_register(&mut **port, name)?;
        Ok(reply.map(|bytes| String::from_utf8_lossy(&bytes).trim().to_ascii_lowercase()))
    }

    // ========================================================================
    // Outbound frames
    // ========================================================================

    /// Encode and write a frame. Invalid frames are refused before anything
    /// reaches the line.
    pub fn send(&self, request: Request) -> DriverResult<Request> {
        let bytes = request.to_bytes()?;
        self.port.lock().write_all(&bytes)?;
        metrics::counter!(metric_defs::FRAMES_TX.name).increment(1);
        self.raw_log.append(&request);
        info!("{}", request);
        debug!("sent {}", request.to_hex());
        Ok(request)
    }

    /// Set a register on this module through an API frame.
    pub fn set_local_register(
        &self,
        name: &str,
        value: impl Into<RegisterValue>,
    ) -> DriverResult<Request> {
        let request = {
            let registers = self.registers.lock();
            LocalAtCommand::new(&registers, name, Some(value.into()), DEFAULT_LOCAL_FRAME_ID)
        };
        self.send(request.into())
    }

    /// Query a register on this module; the reply arrives through the read
    /// loop and updates the register map.
    pub fn get_local_register(&self, name: &str) -> DriverResult<Request> {
        let request = {
            let registers = self.registers.lock();
            LocalAtCommand::new(&registers, name, None, DEFAULT_LOCAL_FRAME_ID)
        };
        self.send(request.into())
    }

    /// Set a register on a remote node, applying it immediately.
    pub fn set_remote_register(
        &self,
        destination: &Address64,
        name: &str,
        value: impl Into<RegisterValue>,
    ) -> DriverResult<Request> {
        let request = {
            let mut registers = self.registers.lock();
            registers.set_destination(destination);
            RemoteAtCommand::new(&registers, name, Some(value.into()), DEFAULT_FRAME_ID, true)
        };
        self.send(request.into())
    }

    /// Query a register on a remote node.
    pub fn get_remote_register(&self, destination: &Address64, name: &str) -> DriverResult<Request> {
        let request = {
            let mut registers = self.registers.lock();
            registers.set_destination(destination);
            RemoteAtCommand::new(&registers, name, None, DEFAULT_FRAME_ID, true)
        };
        self.send(request.into())
    }

    /// Send RF data to one node.
    pub fn send_data(&self, destination: &Address64, data: &[u8]) -> DriverResult<Request> {
        let request = {
            let mut registers = self.registers.lock();
            registers.set_destination(destination);
            TransmitRequest::new(
                &registers,
                data.to_vec(),
                TransmitOptions::default(),
                Word16::from(UNKNOWN_NETWORK_ADDRESS),
            )
        };
        self.send(request.into())
    }

    /// Send UTF-8 text to one node.
    pub fn send_text(&self, destination: &Address64, text: &str) -> DriverResult<Request> {
        self.send_data(destination, text.as_bytes())
    }

    /// Send RF data to every node.
    pub fn broadcast_data(&self, data: &[u8]) -> DriverResult<Request> {
        self.send_data(&Address64::BROADCAST, data)
    }

    /// Ask a node for its neighbors.
    pub fn find_neighbors(&self, target: NeighborTarget) -> DriverResult<Request> {
        let address = match target {
            NeighborTarget::Local => return self.get_local_register("FN"),
            NeighborTarget::Global => {
                return Err(DriverError::NotAllowed {
                    operation: "find neighbors",
                    reason: "cannot query every node at once",
                })
            }
            NeighborTarget::Address(address) => address,
        };
        if address.is_broadcast() {
            return Err(DriverError::NotAllowed {
                operation: "find neighbors",
                reason: "cannot query the broadcast address",
            });
        }
        if self.local_address() == Some(address) {
            return self.get_local_register("FN");
        }
        self.get_remote_register(&address, "FN")
    }

    /// Discover every node on the network.
    pub fn network_discover(&self) -> DriverResult<Request> {
        self.get_local_register("ND")
    }

    /// Send a trace-routed probe; every hop answers with route information.
    pub fn trace_route(&self, destination: &Address64) -> DriverResult<Request> {
        if destination.is_broadcast() {
            return Err(DriverError::NotAllowed {
                operation: "trace route",
                reason: "destination is the broadcast address",
            });
        }
        if self.local_address() == Some(*destination) {
            return Err(DriverError::NotAllowed {
                operation: "trace route",
                reason: "destination is this module",
            });
        }

        let request = {
            let mut registers = self.registers.lock();
            registers.set_destination(destination);
            TransmitRequest::new(
                &registers,
                TRACE_ROUTE_DATA.to_vec(),
                TransmitOptions {
                    option: TRANSMIT_OPTION_TRACE_ROUTE,
                    ..TransmitOptions::default()
                },
                Word16::from(TRACE_ROUTE_RESERVED),
            )
        };
        self.send(request.into())
    }

    /// Ask `sender` to test its link to `destination`. The report comes back
    /// as an explicit receive frame.
    pub fn link_quality_test(
        &self,
        sender: &Address64,
        destination: &Address64,
        payload_size: u16,
        iterations: u16,
    ) -> DriverResult<Request> {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&destination.to_bytes());
        data.extend_from_slice(&payload_size.to_be_bytes());
        data.extend_from_slice(&iterations.to_be_bytes());

        let addressing = ExplicitAddressing::new(LINK_TEST_ENDPOINT, LINK_TEST_ENDPOINT, LINK_TEST_CLUSTER_ID);
        let request = {
            let mut registers = self.registers.lock();
            registers.set_destination(sender);
            ExplicitTransmitRequest::new(&registers, data, &addressing, TransmitOptions::default())
        };
        self.send(request.into())
    }

    // ========================================================================
    // Inbound frames
    // ========================================================================

    /// Read whatever is waiting on the line and run one reassembly pass.
    pub fn read_serial(&self) -> DriverResult<ReadOutcome> {
        let data = self.port.lock().read_available()?;
        if !data.is_empty() {
            metrics::counter!(metric_defs::BYTES_RX.name).increment(data.len() as u64);
        }

        let (outcome, buffered) = {
            let mut reassembler = self.reassembler.lock();
            let mut registers = self.registers.lock();
            let mode = registers.api_mode();
            let outcome = reassembler.feed(&data, mode, &mut registers);
            (outcome, reassembler.buffered_len())
        };
        metrics::gauge!(metric_defs::RX_BUFFERED.name).set(buffered as f64);

        match &outcome {
            ReadOutcome::Transparent(bytes) if !bytes.is_empty() => {
                let text = String::from_utf8_lossy(bytes);
                self.raw_log.append(&text);
                info!("{}", text);
            }
            ReadOutcome::Transparent(_) => {}
            ReadOutcome::Frames(batch) => self.record_batch(batch),
        }
        Ok(outcome)
    }

    fn record_batch(&self, batch: &FrameBatch) {
        if !batch.frames.is_empty() {
            metrics::counter!(metric_defs::FRAMES_RX.name).increment(batch.frames.len() as u64);
        }
        if batch.dropped > 0 {
            metrics::counter!(metric_defs::FRAMES_DROPPED.name).increment(batch.dropped as u64);
        }
        if !batch.unrecognized.is_empty() {
            metrics::counter!(metric_defs::FRAMES_UNRECOGNIZED.name)
                .increment(batch.unrecognized.len() as u64);
        }

        for frame in &batch.frames {
            self.raw_log.append(frame);
            if lookup(frame.frame_type()).is_some_and(|entry| entry.surface) {
                info!("{}", frame);
            } else {
                debug!("{}", frame);
            }
        }
    }
}
