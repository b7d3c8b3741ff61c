use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{config::Membership, protocol::ServerEvent};

pub type ConnId = Uuid;

#[derive(Debug)]
struct Peer {
    tx: mpsc::UnboundedSender<String>,
    rooms: HashSet<String>,
}

#[derive(Debug, Default)]
struct Members {
    peers: HashMap<ConnId, Peer>,
    rooms: HashMap<String, HashSet<ConnId>>,
}

impl Members {
    fn leave(&mut self, conn: ConnId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    membership: Membership,
    members: Mutex<Members>,
}

impl RoomRegistry {
    pub fn new(membership: Membership) -> RoomRegistry {
        RoomRegistry {
            membership,
            members: Mutex::default(),
        }
    }

    fn members(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection; frames addressed to it arrive on the receiver.
    pub fn connect(&self) -> (ConnId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Uuid::now_v7();
        self.members().peers.insert(conn, Peer { tx, rooms: HashSet::new() });
        (conn, rx)
    }

    pub fn disconnect(&self, conn: ConnId) {
        let mut members = self.members();
        if let Some(peer) = members.peers.remove(&conn) {
            for room in &peer.rooms {
                members.leave(conn, room);
            }
        }
    }

    /// Adds `conn` to `room`. Under [`Membership::Exclusive`] the connection
    /// first leaves its other rooms, which are returned.
    pub fn join(&self, conn: ConnId, room: &str) -> Vec<String> {
        let mut members = self.members();
        let Some(peer) = members.peers.get_mut(&conn) else {
            return Vec::new();
        };

        let left: Vec<String> = match self.membership {
            Membership::Additive => Vec::new(),
            Membership::Exclusive => {
                let left = peer.rooms.iter().filter(|r| *r != room).cloned().collect();
                peer.rooms.retain(|r| r == room);
                left
            }
        };
        peer.rooms.insert(room.to_owned());

        for old in &left {
            members.leave(conn, old);
        }
        members.rooms.entry(room.to_owned()).or_default().insert(conn);
        left
    }

    pub fn rooms_of(&self, conn: ConnId) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .members()
            .peers
            .get(&conn)
            .map(|peer| peer.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.members().rooms.get(room).map_or(0, HashSet::len)
    }

    pub fn send_to(&self, conn: ConnId, event: &ServerEvent) -> serde_json::Result<()> {
        let frame = serde_json::to_string(event)?;
        if let Some(peer) = self.members().peers.get(&conn) {
            let _ = peer.tx.send(frame);
        }
        Ok(())
    }

    /// Sends to every member of `room` except `except`; returns how many
    /// connections the frame was queued for.
    pub fn broadcast(
        &self,
        room: &str,
        event: &ServerEvent,
        except: Option<ConnId>,
    ) -> serde_json::Result<usize> {
        let frame = serde_json::to_string(event)?;
        let members = self.members();
        let Some(conns) = members.rooms.get(room) else {
            return Ok(0);
        };

        let mut sent = 0;
        for conn in conns.iter().filter(|conn| Some(**conn) != except) {
            if let Some(peer) = members.peers.get(conn) {
                if peer.tx.send(frame.clone()).is_ok() {
                    sent += 1;
                }
            }
        }
        Ok(sent)
    }
}
