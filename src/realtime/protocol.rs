//! JSON wire protocol for the seat-map WebSocket. Server pushes always carry
//! the full per-seat list, never a diff, so a client that just joined or
//! missed messages self-heals on the next event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::snapshot::SeatView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Subscribe to one showtime's seat map; replaces any previous room.
    JoinRoom { showtime_id: Uuid },
    HoldSeat { seat_id: Uuid },
    ReleaseSeat { seat_id: Uuid },
    ConfirmSeat { seat_id: Uuid },
    /// Drop every hold this connection's holder has in the current room.
    ReleaseAllSeats,
    /// Re-request the current snapshot (private reply).
    GetSeats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomJoined {
        showtime_id: Uuid,
    },
    /// Initial snapshot, sent privately right after a join.
    SeatsInitialized {
        showtime_id: Uuid,
        seats: Vec<SeatView>,
    },
    /// Authoritative snapshot broadcast to the whole room after a committed
    /// mutation.
    SeatStatusUpdated {
        showtime_id: Uuid,
        seats: Vec<SeatView>,
    },
    /// Private reply to the requester only; other clients never see failed
    /// attempts.
    Error {
        code: String,
        seat_id: Option<Uuid>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let showtime = Uuid::new_v4();
        let msg: ClientMessage = serde_json::from_str(&format!(
            r#"{{"type":"join-room","showtime_id":"{showtime}"}}"#
        ))
        .unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { showtime_id: showtime });

        let seat = Uuid::new_v4();
        let msg: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"hold-seat","seat_id":"{seat}"}}"#)).unwrap();
        assert_eq!(msg, ClientMessage::HoldSeat { seat_id: seat });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"release-all-seats"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ReleaseAllSeats);
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"drop-tables"}"#).is_err());
    }

    #[test]
    fn server_errors_serialize_with_code_and_seat() {
        let seat = Uuid::new_v4();
        let msg = ServerMessage::Error {
            code: "seat_unavailable".to_string(),
            seat_id: Some(seat),
            message: "seat is no longer available".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "seat_unavailable");
        assert_eq!(json["seat_id"], seat.to_string());
    }

    #[test]
    fn snapshot_broadcast_carries_the_full_seat_list() {
        let showtime = Uuid::new_v4();
        let msg = ServerMessage::SeatStatusUpdated {
            showtime_id: showtime,
            seats: vec![],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "seat-status-updated");
        assert!(json["seats"].as_array().unwrap().is_empty());
    }
}
