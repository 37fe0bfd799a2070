pub mod codec;
mod protocol;
mod stats;
mod transport;

pub use codec::{CodecError, EncodedPlayer, EncodedState, decode, encode};
pub use protocol::{
    DEFAULT_DISCOVERY_PORT, DEFAULT_GAME_PORTS, Identity, MAX_PACKET_SIZE, Message, PacketError,
};
pub use stats::NetworkStats;
pub use transport::{DEFAULT_LISTEN_TIMEOUT, Transport};
