//! A connected, in-game player: its wire handle, its position, and the
//! chunk view the tick loop keeps in sync with that position.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use craft_protocol::packets::play::{ChunkData, UnloadChunk, UpdateViewPosition};
use craft_util::Uuid;
use craft_world::ChunkStore;

use crate::chunk_loader::{ChunkPos, ChunkView};
use crate::connection::ConnectionSender;
use crate::entity::Vec3;
use crate::error::ConnectionError;

/// A session is considered abandoned, and kicked for inactivity, after this
/// long without a received packet.
pub const OFFLINE_TIMEOUT: Duration = Duration::from_secs(600);

pub struct Player {
    pub entity_id: i32,
    pub uuid: Uuid,
    pub name: String,
    connection: ConnectionSender,
    position: Mutex<Vec3>,
    view: Mutex<ChunkView>,
    last_view_center: Mutex<Option<ChunkPos>>,
    pending_sends: Mutex<VecDeque<ChunkPos>>,
    last_activity: Mutex<Instant>,
}

impl Player {
    pub fn new(entity_id: i32, uuid: Uuid, name: String, connection: ConnectionSender, view_distance: i32) -> Self {
        Self {
            entity_id,
            uuid,
            name,
            connection,
            position: Mutex::new(Vec3::ZERO),
            view: Mutex::new(ChunkView::new(view_distance)),
            last_view_center: Mutex::new(None),
            pending_sends: Mutex::new(VecDeque::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn connection(&self) -> &ConnectionSender {
        &self.connection
    }

    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    pub fn kick(&self, reason: &str) {
        tracing::info!(player = %self.name, %reason, "kicking player");
        self.connection.close();
    }

    pub fn position(&self) -> Vec3 {
        *self.position.lock().unwrap()
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.lock().unwrap() = position;
        self.touch();
    }

    fn chunk_pos(&self) -> ChunkPos {
        let position = self.position();
        ChunkPos::new(
            (position.x as i32).div_euclid(16),
            (position.z as i32).div_euclid(16),
        )
    }

    /// Diffs the player's chunk view against its current position, unloads
    /// what fell out of range, and either sends or queues (if generation
    /// hasn't finished) the chunks that entered it.
    pub fn update_chunk_view(&self, store: &Arc<ChunkStore>) -> Result<(), ConnectionError> {
        let center = self.chunk_pos();
        let mut last_center = self.last_view_center.lock().unwrap();
        if *last_center != Some(center) {
            self.connection.send(&UpdateViewPosition {
                chunk_x: center.x,
                chunk_z: center.z,
            })?;
            *last_center = Some(center);
        }
        drop(last_center);

        let (to_load, to_unload) = self.view.lock().unwrap().update(center);

        for chunk in to_load {
            store.request_load(chunk.x, chunk.z);
            self.pending_sends.lock().unwrap().push_back(chunk);
        }
        self.drain_pending_sends(store)?;

        for chunk in to_unload {
            self.connection.send(&UnloadChunk {
                chunk_x: chunk.x,
                chunk_z: chunk.z,
            })?;
        }

        Ok(())
    }

    fn drain_pending_sends(&self, store: &Arc<ChunkStore>) -> Result<(), ConnectionError> {
        let mut pending = self.pending_sends.lock().unwrap();
        let mut still_pending = VecDeque::new();
        while let Some(chunk) = pending.pop_front() {
            match store.get(chunk.x, chunk.z) {
                Some(loaded) => {
                    self.connection.send(&ChunkData {
                        chunk_x: chunk.x,
                        chunk_z: chunk.z,
                        data: loaded.encode(),
                        block_entities: Vec::new(),
                    })?;
                }
                None => still_pending.push_back(chunk),
            }
        }
        *pending = still_pending;
        Ok(())
    }
}

/// Indexes connected players by the three keys the rest of the server looks
/// them up by. All three maps live behind one mutex: adding or removing a
/// player updates all of them atomically, which is what keeps the indexes
/// from ever disagreeing with each other.
#[derive(Default)]
pub struct PlayerRegistry {
    inner: Mutex<Indexes>,
}

#[derive(Default)]
struct Indexes {
    by_entity_id: HashMap<i32, Arc<Player>>,
    by_uuid: HashMap<Uuid, Arc<Player>>,
    by_name: HashMap<String, Arc<Player>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, player: Arc<Player>) {
        let mut indexes = self.inner.lock().unwrap();
        indexes.by_entity_id.insert(player.entity_id, player.clone());
        indexes.by_uuid.insert(player.uuid, player.clone());
        indexes.by_name.insert(player.name.clone(), player);
    }

    pub fn remove(&self, entity_id: i32) -> Option<Arc<Player>> {
        let mut indexes = self.inner.lock().unwrap();
        let player = indexes.by_entity_id.remove(&entity_id)?;
        indexes.by_uuid.remove(&player.uuid);
        indexes.by_name.remove(&player.name);
        Some(player)
    }

    pub fn by_entity_id(&self, entity_id: i32) -> Option<Arc<Player>> {
        self.inner.lock().unwrap().by_entity_id.get(&entity_id).cloned()
    }

    pub fn by_uuid(&self, uuid: &Uuid) -> Option<Arc<Player>> {
        self.inner.lock().unwrap().by_uuid.get(uuid).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Player>> {
        self.inner.lock().unwrap().by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_entity_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<Player>> {
        self.inner.lock().unwrap().by_entity_id.values().cloned().collect()
    }

    /// Sends `packet` to every connected player, dropping send errors to
    /// individual dead sockets rather than aborting the broadcast.
    pub fn broadcast(&self, packet: &impl craft_protocol::ClientboundEncode) {
        for player in self.all() {
            if let Err(err) = player.connection.send(packet) {
                tracing::debug!(player = %player.name, %err, "broadcast send failed");
            }
        }
    }

    /// Removes and returns players idle past [`OFFLINE_TIMEOUT`] so the
    /// caller can kick them.
    pub fn cleanup_offline(&self) -> Vec<Arc<Player>> {
        let stale: Vec<i32> = self
            .all()
            .into_iter()
            .filter(|p| p.idle_for() > OFFLINE_TIMEOUT || p.is_closed())
            .map(|p| p.entity_id)
            .collect();
        stale.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn registry_indexes_stay_consistent_on_add_and_remove() {
        let registry = PlayerRegistry::new();
        let player = Arc::new(Player::new(
            10_000,
            Uuid::offline_player("Steve"),
            "Steve".to_owned(),
            test_sender(),
            8,
        ));
        registry.add(player.clone());
        assert!(registry.by_name("Steve").is_some());
        assert!(registry.by_uuid(&Uuid::offline_player("Steve")).is_some());
        registry.remove(10_000);
        assert!(registry.by_name("Steve").is_none());
        assert!(registry.by_uuid(&Uuid::offline_player("Steve")).is_none());
    }

    #[test]
    fn update_chunk_view_requests_loads_for_a_fresh_player() {
        let pool = Arc::new(craft_util::WorkerPool::new(1));
        let dir = std::env::temp_dir().join(format!("craft-player-test-{}", std::process::id()));
        let store = Arc::new(ChunkStore::new(&dir, pool));
        let player = Player::new(10_000, Uuid::offline_player("Steve"), "Steve".to_owned(), test_sender(), 2);

        player.update_chunk_view(&store).unwrap();
        assert_eq!(*player.last_view_center.lock().unwrap(), Some(ChunkPos::new(0, 0)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn test_sender() -> ConnectionSender {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        crate::connection::Connection::new(server).unwrap().sender()
    }
}
