//! Overlay wire unit and its form-style encoding.
//!
//! On the wire every field is a string: integers in decimal, binary fields
//! (IDs and data) in padded base64url. [`WirePacket`] is that flat form;
//! [`Packet`] is the decoded value the router works with.

use crate::error::{BlockchainError, Result};
use crate::utils::{base64url_decode, base64url_encode, gen_rand_bytes};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Current version of the overlay protocol
pub const PROTOCOL_VERSION: u32 = 0;

/// Hop budget given to packets a node originates
pub const HOP_LIMIT_DEFAULT: u32 = 128;

/// Length of a node ID in bytes
pub const NODE_ID_LEN: usize = 32;

/// Node identity: an opaque byte string compared byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Vec<u8>);

impl NodeId {
    pub fn new(bytes: Vec<u8>) -> NodeId {
        NodeId(bytes)
    }

    /// Fresh random identity of [`NODE_ID_LEN`] bytes.
    pub fn random() -> NodeId {
        NodeId(gen_rand_bytes(NODE_ID_LEN))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64url_decode("node id", &encoded)
            .map(NodeId)
            .map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Join,
    Ping,
    Pong,
    Send,
    Broadcast,
    BroadcastResponse,
    Leave,
}

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Join => "JOIN",
            PacketType::Ping => "PING",
            PacketType::Pong => "PONG",
            PacketType::Send => "SEND",
            PacketType::Broadcast => "BROADCAST",
            PacketType::BroadcastResponse => "BROADCAST-RESPONSE",
            PacketType::Leave => "LEAVE",
        }
    }

    pub fn parse(tag: &str) -> Result<PacketType> {
        match tag {
            "JOIN" => Ok(PacketType::Join),
            "PING" => Ok(PacketType::Ping),
            "PONG" => Ok(PacketType::Pong),
            "SEND" => Ok(PacketType::Send),
            "BROADCAST" => Ok(PacketType::Broadcast),
            "BROADCAST-RESPONSE" => Ok(PacketType::BroadcastResponse),
            "LEAVE" => Ok(PacketType::Leave),
            _ => Err(BlockchainError::Decode(format!("Unknown packet type: {tag}"))),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendType {
    Singlecast,
    Broadcast,
}

impl SendType {
    pub fn code(&self) -> u8 {
        match self {
            SendType::Singlecast => 0,
            SendType::Broadcast => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<SendType> {
        match code {
            0 => Ok(SendType::Singlecast),
            1 => Ok(SendType::Broadcast),
            _ => Err(BlockchainError::Decode(format!("Unknown send type: {code}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u32,
    pub kind: PacketType,
    pub source_id: NodeId,
    pub destination_id: NodeId,
    pub source_addr: String,
    pub destination_addr: String,
    pub data: Vec<u8>,
    pub hop_limit: u32,
    pub send_type: SendType,
}

impl Packet {
    /// A packet at the current protocol version with the default hop budget.
    pub fn new(kind: PacketType, source_id: NodeId, source_addr: &str, data: &[u8]) -> Packet {
        Packet {
            version: PROTOCOL_VERSION,
            kind,
            source_id,
            destination_id: NodeId::default(),
            source_addr: source_addr.to_string(),
            destination_addr: String::new(),
            data: data.to_vec(),
            hop_limit: HOP_LIMIT_DEFAULT,
            send_type: SendType::Singlecast,
        }
    }

    pub fn to(mut self, destination_id: NodeId, destination_addr: &str) -> Packet {
        self.destination_id = destination_id;
        self.destination_addr = destination_addr.to_string();
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u32) -> Packet {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_send_type(mut self, send_type: SendType) -> Packet {
        self.send_type = send_type;
        self
    }

    /// The copy a node passes on: one hop spent, or `None` once the budget
    /// reaches zero.
    pub fn next_hop(&self) -> Option<Packet> {
        let remaining = self.hop_limit.saturating_sub(1);
        if remaining == 0 {
            return None;
        }
        let mut forwarded = self.clone();
        forwarded.hop_limit = remaining;
        Some(forwarded)
    }

    pub fn to_wire(&self) -> WirePacket {
        WirePacket {
            protocol_version: self.version.to_string(),
            kind: self.kind.as_str().to_string(),
            source_id: self.source_id.to_base64url(),
            destination_id: self.destination_id.to_base64url(),
            source_addr: self.source_addr.clone(),
            destination_addr: self.destination_addr.clone(),
            data: base64url_encode(&self.data),
            hop_limit: self.hop_limit.to_string(),
            send_type: self.send_type.code().to_string(),
        }
    }

    pub fn from_wire(wire: &WirePacket) -> Result<Packet> {
        Ok(Packet {
            version: parse_integer("protocolVersion", &wire.protocol_version)?,
            kind: PacketType::parse(&wire.kind)?,
            source_id: NodeId(base64url_decode("sourceID", &wire.source_id)?),
            destination_id: NodeId(base64url_decode("destinationID", &wire.destination_id)?),
            source_addr: wire.source_addr.clone(),
            destination_addr: wire.destination_addr.clone(),
            data: base64url_decode("data", &wire.data)?,
            hop_limit: parse_integer("hopLimit", &wire.hop_limit)?,
            send_type: SendType::from_code(parse_integer("sendType", &wire.send_type)?)?,
        })
    }
}

fn parse_integer<T: std::str::FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| BlockchainError::Decode(format!("Invalid integer in {field}: {value:?} ({e})")))
}

/// Flat, form-encodable rendering of a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePacket {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "destinationID")]
    pub destination_id: String,
    #[serde(rename = "sourceAddr")]
    pub source_addr: String,
    #[serde(rename = "destinationAddr")]
    pub destination_addr: String,
    pub data: String,
    #[serde(rename = "hopLimit")]
    pub hop_limit: String,
    #[serde(rename = "sendType")]
    pub send_type: String,
}
