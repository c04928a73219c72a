//! Facade tests against a simulated module.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use digimesh_api::*;
use digimesh_at::{ManualClock, SerialChannel};
use digimesh_driver::*;
use parking_lot::Mutex;

const BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Module state shared between the test and the driver's channel.
struct SimState {
    module_baud: u32,
    port_baud: u32,
    command_mode: bool,
    registers: HashMap<String, String>,
    input: VecDeque<u8>,
    pending: Vec<u8>,
    lines: Vec<String>,
    frames: Vec<Vec<u8>>,
    reopened: Vec<u32>,
}

#[derive(Clone)]
struct SimModule(Arc<Mutex<SimState>>);

impl SimModule {
    fn new(module_baud: u32) -> Self {
        let registers = [
            ("ID", "7FFF"),
            ("CE", "0"),
            ("BH", "0"),
            ("SH", "13A200"),
            ("SL", "41526B9C"),
            ("DH", "0"),
            ("DL", "FFFF"),
            ("AP", "2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        SimModule(Arc::new(Mutex::new(SimState {
            module_baud,
            port_baud: 9600,
            command_mode: false,
            registers,
            input: VecDeque::new(),
            pending: Vec::new(),
            lines: Vec::new(),
            frames: Vec::new(),
            reopened: Vec::new(),
        })))
    }

    /// Queue bytes for the driver to read.
    fn inject(&self, data: &[u8]) {
        self.0.lock().input.extend(data);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().lines.clone()
    }

    fn frames(&self) -> Vec<Vec<u8>> {
        self.0.lock().frames.clone()
    }

    fn last_frame(&self) -> Vec<u8> {
        self.frames().pop().expect("no frame written")
    }

    fn reopened(&self) -> Vec<u32> {
        self.0.lock().reopened.clone()
    }
}

impl SimState {
    fn reply(&mut self, text: &str) {
        self.input.extend(text.as_bytes());
    }

    fn handle_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
        let body = &line[2..];
        match body {
            "CN" => {
                self.command_mode = false;
                self.reply("OK\r");
            }
            "AC" => {
                if let Some(code) = self.registers.get("BD") {
                    self.module_baud = BAUD_RATES[code.parse::<usize>().unwrap()];
                }
                self.reply("OK\r");
            }
            "WR" => self.reply("OK\r"),
            _ if body.len() == 2 => {
                let value = self.registers.get(body).cloned().unwrap_or_default();
                self.reply(&format!("{}\r", value));
            }
            _ => {
                let (name, value) = body.split_at(2);
                self.registers.insert(name.to_string(), value.to_string());
                self.reply("OK\r");
            }
        }
    }
}

impl SerialChannel for SimModule {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.0.lock().input.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.0.lock().input.drain(..).collect())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.0.lock();
        if state.port_baud != state.module_baud {
            return Ok(());
        }
        if data == b"+++" {
            state.lines.push("+++".to_string());
            state.command_mode = true;
            state.reply("OK\r");
            return Ok(());
        }
        if !state.command_mode {
            state.frames.push(data.to_vec());
            return Ok(());
        }
        for &byte in data {
            if byte == b'\r' {
                let line = String::from_utf8(std::mem::take(&mut state.pending)).unwrap();
                state.handle_line(&line);
            } else {
                state.pending.push(byte);
            }
        }
        Ok(())
    }

    fn flush_io(&mut self) -> io::Result<()> {
        self.0.lock().input.clear();
        Ok(())
    }

    fn reopen(&mut self, baud: u32) -> io::Result<()> {
        let mut state = self.0.lock();
        state.port_baud = baud;
        state.reopened.push(baud);
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.0.lock().port_baud
    }
}

fn module_with(sim: &SimModule, config: ModuleConfig) -> MeshModule {
    MeshModule::new(
        Box::new(sim.clone()),
        config,
        Arc::new(ManualClock::new()),
        RawLog::disabled(),
    )
}

fn started_module(sim: &SimModule) -> MeshModule {
    let module = module_with(sim, ModuleConfig::default());
    module.initialize().unwrap();
    module
}

fn remote() -> Address64 {
    Address64::parse("0013a200", "41526ba0").unwrap()
}

/// `payload` as it appears on the line in API mode 2.
fn api_frame(payload: &[u8]) -> Vec<u8> {
    escape(&wrap_frame(payload))
}

#[test]
fn test_initialize_programs_and_reads_back() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    let lines = sim.lines();
    assert_eq!(
        &lines[..11],
        &[
            "+++", "ATGTA", "ATID7fff", "ATAP2", "ATCE0", "ATNO4", "ATDLffff", "ATDH0", "ATAC",
            "ATWR", "ATCN"
        ]
    );
    assert_eq!(&lines[11..14], &["+++", "ATID", "ATCN"]);

    let registers = module.registers();
    assert_eq!(registers.get("ID"), Some("7fff"));
    assert_eq!(registers.get("CE"), Some("00"));
    assert_eq!(registers.get("SH"), Some("0013a200"));
    assert_eq!(registers.get("SL"), Some("41526b9c"));
    assert_eq!(registers.get("DL"), Some("0000ffff"));
    assert_eq!(registers.get("AP"), Some("02"));
    assert_eq!(module.api_mode(), ApiMode::ApiEscaped);
    assert_eq!(
        module.local_address(),
        Some(Address64::parse("0013a200", "41526b9c").unwrap())
    );
    assert!(sim.frames().is_empty());
}

#[test]
fn test_initialize_probes_and_switches_baud() {
    let sim = SimModule::new(57600);
    let module = started_module(&sim);

    assert_eq!(sim.reopened(), vec![9600, 57600, 9600]);
    assert!(sim.lines().contains(&"ATBD3".to_string()));
    assert_eq!(module.register("ID").as_deref(), Some("7fff"));
}

#[test]
fn test_initialize_unreachable() {
    let sim = SimModule::new(230400);
    let module = module_with(&sim, ModuleConfig::default());

    let err = module.initialize().unwrap_err();
    assert!(err.is_unreachable());
    assert!(sim.lines().is_empty());
}

#[test]
fn test_send_data_escapes_reserved_bytes() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    module.send_data(&remote(), &[0x7E, 0x11, 0x41]).unwrap();

    let mut payload = vec![FRAME_TRANSMIT_REQUEST, 0x01];
    payload.extend_from_slice(&remote().to_bytes());
    payload.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00, 0x7E, 0x11, 0x41]);
    let written = sim.last_frame();
    assert_eq!(written, api_frame(&payload));
    assert_eq!(written[0], START_DELIMITER);
    assert_eq!(written.iter().filter(|b| **b == START_DELIMITER).count(), 1);

    let registers = module.registers();
    assert_eq!(registers.get("DH"), Some("0013a200"));
    assert_eq!(registers.get("DL"), Some("41526ba0"));
}

#[test]
fn test_broadcast_and_text() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    module.broadcast_data(b"hi").unwrap();
    let mut payload = vec![FRAME_TRANSMIT_REQUEST, 0x01];
    payload.extend_from_slice(&Address64::BROADCAST.to_bytes());
    payload.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x00, b'h', b'i']);
    assert_eq!(sim.last_frame(), api_frame(&payload));

    let request = module.send_text(&remote(), "hello").unwrap();
    assert!(request.to_string().contains("data: hex'68656C6C6F'"));
}

#[test]
fn test_local_register_frames() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    module.get_local_register("ID").unwrap();
    assert_eq!(sim.last_frame(), hex::decode("7E00040852494462").unwrap());

    module.set_local_register("NI", "node").unwrap();
    let mut payload = vec![FRAME_LOCAL_AT_COMMAND, DEFAULT_LOCAL_FRAME_ID, b'N', b'I'];
    payload.extend_from_slice(b"node");
    assert_eq!(sim.last_frame(), api_frame(&payload));
}

#[test]
fn test_invalid_request_not_sent() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    let err = module.get_local_register("IDX").unwrap_err();
    assert!(matches!(err, DriverError::Frame(FrameError::InvalidArgument { .. })));
    assert!(sim.frames().is_empty());
}

#[test]
fn test_remote_register_frames() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    module.set_remote_register(&remote(), "ID", vec![0x12, 0x34]).unwrap();

    let mut payload = vec![FRAME_REMOTE_AT_COMMAND, DEFAULT_FRAME_ID];
    payload.extend_from_slice(&remote().to_bytes());
    payload.extend_from_slice(&[0xFF, 0xFE, REMOTE_APPLY_CHANGES, b'I', b'D', 0x12, 0x34]);
    assert_eq!(sim.last_frame(), api_frame(&payload));
}

#[test]
fn test_find_neighbors_targets() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    assert!(matches!(
        module.find_neighbors(NeighborTarget::Global),
        Err(DriverError::NotAllowed { .. })
    ));
    assert!(matches!(
        module.find_neighbors(NeighborTarget::Address(Address64::BROADCAST)),
        Err(DriverError::NotAllowed { .. })
    ));
    assert!(sim.frames().is_empty());

    let local = module.local_address().unwrap();
    let request = module.find_neighbors(NeighborTarget::Address(local)).unwrap();
    assert_eq!(request.frame_type(), FRAME_LOCAL_AT_COMMAND);

    let request = module.find_neighbors(NeighborTarget::Local).unwrap();
    assert_eq!(request.frame_type(), FRAME_LOCAL_AT_COMMAND);

    let request = module.find_neighbors(NeighborTarget::Address(remote())).unwrap();
    assert_eq!(request.frame_type(), FRAME_REMOTE_AT_COMMAND);
    assert_eq!(request.frame_data()[13..15], *b"FN");

    let request = module.network_discover().unwrap();
    assert_eq!(request.frame_data()[2..4], *b"ND");
}

#[test]
fn test_trace_route() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    let local = module.local_address().unwrap();
    assert!(matches!(
        module.trace_route(&local),
        Err(DriverError::NotAllowed { .. })
    ));
    assert!(matches!(
        module.trace_route(&Address64::BROADCAST),
        Err(DriverError::NotAllowed { .. })
    ));

    module.trace_route(&remote()).unwrap();
    let mut payload = vec![FRAME_TRANSMIT_REQUEST, 0x01];
    payload.extend_from_slice(&remote().to_bytes());
    payload.extend_from_slice(&[0xFF, 0xFF, 0x00, TRANSMIT_OPTION_TRACE_ROUTE, 1, 2, 3]);
    assert_eq!(sim.last_frame(), api_frame(&payload));
}

#[test]
fn test_link_quality_test_frame() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);
    let sender = remote();
    let destination = Address64::parse("0013a200", "41526bb0").unwrap();

    module
        .link_quality_test(
            &sender,
            &destination,
            DEFAULT_LINK_TEST_PAYLOAD,
            DEFAULT_LINK_TEST_ITERATIONS,
        )
        .unwrap();

    let mut payload = vec![FRAME_EXPLICIT_TRANSMIT, 0x01];
    payload.extend_from_slice(&sender.to_bytes());
    payload.extend_from_slice(&[0xFF, 0xFE, 0xE6, 0xE6, 0x00, 0x14, 0xC1, 0x05, 0x00, 0x00]);
    payload.extend_from_slice(&destination.to_bytes());
    payload.extend_from_slice(&[0x00, 0x20, 0x00, 0xC8]);
    assert_eq!(sim.last_frame(), api_frame(&payload));
    assert_eq!(module.register("DL").as_deref(), Some("41526ba0"));
}

#[test]
fn test_read_serial_across_reads() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    let frame = api_frame(&[FRAME_LOCAL_AT_RESPONSE, 0x52, b'I', b'D', 0x00, 0x12, 0x34]);
    let (head, tail) = frame.split_at(5);

    sim.inject(head);
    match module.read_serial().unwrap() {
        ReadOutcome::Frames(batch) => assert!(batch.frames.is_empty()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(module.buffered_len(), 4);

    sim.inject(tail);
    let batch = match module.read_serial().unwrap() {
        ReadOutcome::Frames(batch) => batch,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(batch.frames.len(), 1);
    assert_eq!(module.register("ID").as_deref(), Some("1234"));
    assert_eq!(module.register("SH").as_deref(), Some("0013a200"));
    assert_eq!(module.buffered_len(), 0);
}

#[test]
fn test_read_serial_drops_corrupt_frame() {
    let sim = SimModule::new(9600);
    let module = started_module(&sim);

    let mut corrupt = wrap_frame(&[FRAME_TRANSMIT_STATUS, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x00]);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;
    sim.inject(&corrupt);
    sim.inject(&api_frame(&[FRAME_TRANSMIT_STATUS, 0x02, 0xFF, 0xFE, 0x00, 0x00, 0x00]));

    let batch = match module.read_serial().unwrap() {
        ReadOutcome::Frames(batch) => batch,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(batch.dropped, 1);
    assert_eq!(batch.frames.len(), 1);
    assert_eq!(batch.frames[0].frame_id(), Some(0x02));
}

#[test]
fn test_transparent_mode() {
    let sim = SimModule::new(9600);
    let config = ModuleConfig {
        api_mode: 0,
        ..ModuleConfig::default()
    };
    let module = module_with(&sim, config);
    module.initialize().unwrap();
    assert_eq!(module.api_mode(), ApiMode::Transparent);

    sim.inject(b"hello");
    match module.read_serial().unwrap() {
        ReadOutcome::Transparent(bytes) => assert_eq!(bytes, b"hello"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_raw_log_records_frames() {
    let sim = SimModule::new(9600);
    let dir = std::env::temp_dir().join(format!("digimesh-module-test-{}", std::process::id()));
    let module = MeshModule::new(
        Box::new(sim.clone()),
        ModuleConfig::default(),
        Arc::new(ManualClock::new()),
        RawLog::create(&dir).unwrap(),
    );
    module.initialize().unwrap();

    module.broadcast_data(b"hi").unwrap();
    sim.inject(&api_frame(&[FRAME_LOCAL_AT_RESPONSE, 0x52, b'D', b'B', 0x00, 0x28]));
    module.read_serial().unwrap();

    let path = module.raw_log().path().unwrap().to_path_buf();
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("OUT (addr:  GLOBAL ) data: hex'6869'"));
    assert!(lines[1].contains("Registry 'DB' = '28'"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_read_loop_delivers_frames() {
    let sim = SimModule::new(9600);
    let module = Arc::new(started_module(&sim));

    let (reader, outcomes) = ReadLoop::spawn(module.clone(), Duration::from_millis(1));
    assert!(reader.is_running());

    let mut payload = vec![FRAME_RECEIVE_PACKET, 0x00, 0x13, 0xA2, 0x00, 0x41, 0x52, 0x6B, 0xA0];
    payload.extend_from_slice(&[0xFF, 0xFE, 0x01]);
    payload.extend_from_slice(b"ping");
    sim.inject(&api_frame(&payload));

    let outcome = outcomes.recv_timeout(Duration::from_secs(5)).unwrap();
    let batch = match outcome {
        ReadOutcome::Frames(batch) => batch,
        other => panic!("unexpected {:?}", other),
    };
    let events: Vec<ModuleEvent> = batch.frames.iter().filter_map(ModuleEvent::from_frame).collect();
    assert_eq!(
        events,
        vec![ModuleEvent::Data {
            from: AddressWord([0x41, 0x52, 0x6B, 0xA0]),
            data: b"ping".to_vec(),
        }]
    );

    reader.stop();
}
