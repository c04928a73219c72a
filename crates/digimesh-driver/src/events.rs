//! Interpretation of decoded frames.
//!
//! [`ModuleEvent::from_frame`] picks out the frames an application acts on:
//! received data, signal strength replies, discovery results, trace route hops
//! and link test reports. Everything else (transmit status, plain register
//! replies) yields `None`.

use std::fmt;

use digimesh_api::*;

/// Offset of the responding node's SL inside an ND or FN reply value.
const DISCOVERY_NODE_OFFSET: usize = 6;

/// Minimum link test report payload: header, destination, payload size,
/// iterations, counters and the result byte at offset 16.
const LINK_TEST_MIN_LEN: usize = 17;

/// Something the application may want to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    /// RF data from another node.
    Data {
        /// Sender's low address word.
        from: AddressWord,
        /// Payload.
        data: Vec<u8>,
    },
    /// Signal strength of the last received packet (DB reply).
    Rssi(i16),
    /// A node answered network discovery (ND reply).
    NetworkDiscovery {
        /// Node's low address word.
        node: AddressWord,
        /// Signal strength in dBm.
        rssi: i16,
    },
    /// A neighbor answered find neighbors (FN reply, local or remote).
    Neighbor {
        /// Neighbor's low address word.
        node: AddressWord,
        /// Signal strength in dBm.
        rssi: i16,
    },
    /// One hop of a trace route.
    RouteHop {
        /// Node reporting the hop.
        responder: Address64,
        /// Next hop it forwarded to.
        receiver: Address64,
    },
    /// Result of a link quality test.
    LinkTest {
        /// Node that ran the test.
        from: AddressWord,
        /// Node it tested against.
        to: AddressWord,
        /// Bytes per test packet.
        payload_size: u16,
        /// Number of test packets.
        iterations: u16,
        /// Whether the test completed.
        success: bool,
        /// Average signal strength in dBm.
        rssi: i16,
    },
}

/// Negated last byte, the module's RSSI encoding.
fn rssi(data: &[u8]) -> Option<i16> {
    data.last().map(|b| -i16::from(*b))
}

fn word_at(data: &[u8], offset: usize) -> Option<AddressWord> {
    let bytes = data.get(offset..offset + 4)?;
    Some(AddressWord([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn discovery_reply(command: &str, value: &[u8], remote: bool) -> Option<ModuleEvent> {
    match command {
        "DB" if !remote => Some(ModuleEvent::Rssi(rssi(value)?)),
        "ND" if !remote => Some(ModuleEvent::NetworkDiscovery {
            node: word_at(value, DISCOVERY_NODE_OFFSET)?,
            rssi: rssi(value)?,
        }),
        "FN" => Some(ModuleEvent::Neighbor {
            node: word_at(value, DISCOVERY_NODE_OFFSET)?,
            rssi: rssi(value)?,
        }),
        _ => None,
    }
}

impl ModuleEvent {
    /// Classify a decoded frame. Replies too short to carry the expected
    /// fields yield `None`.
    pub fn from_frame(frame: &Response) -> Option<ModuleEvent> {
        match frame {
            Response::Receive(packet) => Some(ModuleEvent::Data {
                from: packet.source_low,
                data: packet.data.clone(),
            }),
            Response::LocalAt(reply) => {
                discovery_reply(&reply.command, reply.value.as_deref()?, false)
            }
            Response::RemoteAt(reply) => {
                discovery_reply(&reply.command, reply.value.as_deref()?, true)
            }
            Response::RouteInformation(info) => Some(ModuleEvent::RouteHop {
                responder: info.responder,
                receiver: info.receiver,
            }),
            Response::ExplicitReceive(packet) => {
                let data = &packet.data;
                if data.len() < LINK_TEST_MIN_LEN {
                    return None;
                }
                Some(ModuleEvent::LinkTest {
                    from: packet.source.low,
                    to: word_at(data, 4)?,
                    payload_size: u16_at(data, 8)?,
                    iterations: u16_at(data, 10)?,
                    success: data[16] == 0x00,
                    rssi: rssi(data)?,
                })
            }
            Response::TransmitStatus(_) => None,
        }
    }
}

impl fmt::Display for ModuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleEvent::Data { from, data } => {
                write!(f, "{}: {}", from, String::from_utf8_lossy(data))
            }
            ModuleEvent::Rssi(rssi) => write!(f, "XBee last RSSI: {}", rssi),
            ModuleEvent::NetworkDiscovery { node, rssi } => {
                write!(f, "XBee Network Discovery: {} - RSSI: {} dBm", node, rssi)
            }
            ModuleEvent::Neighbor { node, rssi } => {
                write!(f, "XBee Find Neighbors: {} - RSSI: {} dBm", node, rssi)
            }
            ModuleEvent::RouteHop {
                responder,
                receiver,
            } => write!(f, "XBee Route Hop: {} -> {}", responder, receiver),
            ModuleEvent::LinkTest {
                from,
                to,
                payload_size,
                iterations,
                success,
                rssi,
            } => write!(
                f,
                "XBee Link Test: {} - {}: RSSI: {} dBm (average on {} iterations - {} bytes each) [{}]",
                from,
                to,
                rssi,
                iterations,
                payload_size,
                if *success { "SUCCESS" } else { "ERROR" }
            ),
        }
    }
}
