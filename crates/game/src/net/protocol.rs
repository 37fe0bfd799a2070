use serde::{Deserialize, Serialize};

use super::codec::EncodedState;

pub const MAX_PACKET_SIZE: usize = 4096;
pub const DEFAULT_DISCOVERY_PORT: u16 = 5005;
pub const DEFAULT_GAME_PORTS: [u16; 2] = [5006, 5007];

/// Random per-process identity used for pairing and seat assignment.
pub type Identity = u64;

/// Every datagram carries exactly one of these, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Message {
    State { state: EncodedState },
    Quit,
    Discovery { sender: Identity },
    StopScan { sender: Identity, to_pid: Identity },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(serde_json::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(serde_json::Error),
    #[error("packet of {0} bytes exceeds the datagram limit")]
    TooLarge(usize),
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::State { .. } => "state",
            Message::Quit => "quit",
            Message::Discovery { .. } => "discovery",
            Message::StopScan { .. } => "stop_scan",
        }
    }

    /// Identity of the announcing peer, for discovery messages.
    pub fn sender(&self) -> Option<Identity> {
        match self {
            Message::Discovery { sender } | Message::StopScan { sender, .. } => Some(*sender),
            Message::State { .. } | Message::Quit => None,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let data = serde_json::to_vec(self).map_err(PacketError::Serialize)?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge(data.len()));
        }
        Ok(data)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        serde_json::from_slice(data).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::codec::encode;
    use crate::rules::GameState;

    #[test]
    fn test_control_messages_wire_format() {
        let quit = Message::Quit.serialize().unwrap();
        assert_eq!(quit, br#"{"action":"quit"}"#);

        let discovery = Message::Discovery { sender: 42 }.serialize().unwrap();
        assert_eq!(discovery, br#"{"action":"discovery","sender":42}"#);

        let stop = Message::StopScan {
            sender: 1,
            to_pid: 2,
        };
        let data = stop.serialize().unwrap();
        assert_eq!(data, br#"{"action":"stop_scan","sender":1,"to_pid":2}"#);
        assert_eq!(Message::deserialize(&data).unwrap(), stop);
    }

    #[test]
    fn test_state_message_fits_datagram() {
        let mut state = GameState::random();
        let card = state.attacking_player().cards[0];
        state.attack(card).unwrap();

        let message = Message::State {
            state: encode(&state),
        };
        let data = message.serialize().unwrap();
        assert!(data.len() <= MAX_PACKET_SIZE);

        let decoded = Message::deserialize(&data).unwrap();
        assert_eq!(decoded.action(), "state");
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = Message::deserialize(br#"{"action":"dance"}"#);
        assert!(matches!(result, Err(PacketError::Deserialize(_))));

        let result = Message::deserialize(b"not json at all");
        assert!(matches!(result, Err(PacketError::Deserialize(_))));
    }

    #[test]
    fn test_sender() {
        assert_eq!(Message::Discovery { sender: 9 }.sender(), Some(9));
        assert_eq!(Message::Quit.sender(), None);
    }
}
