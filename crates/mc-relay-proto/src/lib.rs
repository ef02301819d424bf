//! Minecraft Java Edition (protocol 47) wire types, framing, and the packet
//! table consumed by the relay.

pub mod codec;
pub mod compression;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod packets;
pub mod registry;
pub mod state;
pub mod types;

pub use error::ProtoError;
pub use frame::{FrameDecoder, FrameEncoder};
pub use packets::{Packet, PacketKind};
pub use registry::{decode_packet, encode_packet};
pub use state::{Direction, ProtocolPhase};
