//! Session/Room registry: which connections are watching which showtime, and
//! which holder each connection authenticated as. Dropping the last member of
//! a room drops the room entry; seat state itself lives in the store and is
//! unaffected.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::realtime::protocol::ServerMessage;

const BROADCAST_CAPACITY: usize = 64;

struct Room {
    tx: broadcast::Sender<ServerMessage>,
    members: HashSet<Uuid>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            members: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub holder_id: Uuid,
    pub showtime_id: Uuid,
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<Uuid, Room>,
    sessions: DashMap<Uuid, Session>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to a showtime's room and returns a receiver for
    /// that room's broadcasts. Joining while already in a room leaves the old
    /// one first.
    pub fn join(
        &self,
        showtime_id: Uuid,
        conn_id: Uuid,
        holder_id: Uuid,
    ) -> broadcast::Receiver<ServerMessage> {
        self.leave(conn_id);
        let mut room = self.rooms.entry(showtime_id).or_insert_with(Room::new);
        room.members.insert(conn_id);
        let rx = room.tx.subscribe();
        drop(room);
        self.sessions.insert(
            conn_id,
            Session {
                holder_id,
                showtime_id,
            },
        );
        rx
    }

    /// Idempotent: unknown connections are a no-op. Returns the session that
    /// was removed so the caller can run disconnect cleanup.
    pub fn leave(&self, conn_id: Uuid) -> Option<Session> {
        let (_, session) = self.sessions.remove(&conn_id)?;
        if let Some(mut room) = self.rooms.get_mut(&session.showtime_id) {
            room.members.remove(&conn_id);
        }
        self.rooms
            .remove_if(&session.showtime_id, |_, room| room.members.is_empty());
        Some(session)
    }

    pub fn members_of(&self, showtime_id: Uuid) -> Vec<Uuid> {
        self.rooms
            .get(&showtime_id)
            .map(|room| room.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn holder_of(&self, conn_id: Uuid) -> Option<Uuid> {
        self.sessions.get(&conn_id).map(|s| s.holder_id)
    }

    /// Sends to every current member; returns how many receivers got it.
    pub fn broadcast(&self, showtime_id: Uuid, message: ServerMessage) -> usize {
        self.rooms
            .get(&showtime_id)
            .and_then(|room| room.tx.send(message).ok())
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_track_membership_and_holders() {
        let registry = RoomRegistry::new();
        let showtime = Uuid::new_v4();
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (holder_a, holder_b) = (Uuid::new_v4(), Uuid::new_v4());

        registry.join(showtime, conn_a, holder_a);
        registry.join(showtime, conn_b, holder_b);

        let mut members = registry.members_of(showtime);
        members.sort();
        let mut expected = vec![conn_a, conn_b];
        expected.sort();
        assert_eq!(members, expected);
        assert_eq!(registry.holder_of(conn_a), Some(holder_a));
        assert_eq!(registry.holder_of(conn_b), Some(holder_b));

        let session = registry.leave(conn_a).unwrap();
        assert_eq!(session.holder_id, holder_a);
        assert_eq!(session.showtime_id, showtime);
        assert_eq!(registry.members_of(showtime), vec![conn_b]);

        // Leaving twice is a no-op.
        assert!(registry.leave(conn_a).is_none());
        assert_eq!(registry.holder_of(conn_a), None);
    }

    #[test]
    fn last_member_out_drops_the_room() {
        let registry = RoomRegistry::new();
        let showtime = Uuid::new_v4();
        let conn = Uuid::new_v4();

        registry.join(showtime, conn, Uuid::new_v4());
        assert_eq!(registry.room_count(), 1);
        registry.leave(conn);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.members_of(showtime).is_empty());
    }

    #[test]
    fn rejoining_switches_rooms() {
        let registry = RoomRegistry::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let conn = Uuid::new_v4();
        let holder = Uuid::new_v4();

        registry.join(first, conn, holder);
        registry.join(second, conn, holder);

        assert!(registry.members_of(first).is_empty());
        assert_eq!(registry.members_of(second), vec![conn]);
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn members_see_broadcasts_in_the_same_order() {
        let registry = RoomRegistry::new();
        let showtime = Uuid::new_v4();
        let mut rx_a = registry.join(showtime, Uuid::new_v4(), Uuid::new_v4());
        let mut rx_b = registry.join(showtime, Uuid::new_v4(), Uuid::new_v4());

        let first = ServerMessage::RoomJoined {
            showtime_id: showtime,
        };
        let second = ServerMessage::SeatStatusUpdated {
            showtime_id: showtime,
            seats: vec![],
        };
        assert_eq!(registry.broadcast(showtime, first), 2);
        assert_eq!(registry.broadcast(showtime, second), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert!(matches!(
                rx.recv().await.unwrap(),
                ServerMessage::RoomJoined { .. }
            ));
            assert!(matches!(
                rx.recv().await.unwrap(),
                ServerMessage::SeatStatusUpdated { .. }
            ));
        }
    }

    #[test]
    fn broadcast_to_an_empty_room_reaches_nobody() {
        let registry = RoomRegistry::new();
        let sent = registry.broadcast(
            Uuid::new_v4(),
            ServerMessage::RoomJoined {
                showtime_id: Uuid::new_v4(),
            },
        );
        assert_eq!(sent, 0);
    }
}
