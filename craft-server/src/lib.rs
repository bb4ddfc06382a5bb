pub mod acceptor;
pub mod chunk_loader;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod perf;
pub mod player;
pub mod tick;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use craft_protocol::packets::handshake::NextState;
use craft_protocol::packets::login::{is_valid_username, LoginSuccess};
use craft_protocol::packets::play::{JoinGame, PlayerPosition, PlayerPositionAndLook};
use craft_protocol::packets::status::{PingResponse, StatusResponse};
use craft_protocol::{ClientboundEncode, Phase, PacketRegistry, ServerboundPacket};
use craft_util::{Uuid, WorkerPool};
use craft_world::ChunkStore;

use acceptor::Acceptor;
use config::Config;
use connection::Connection;
use entity::EntityTable;
use error::{ConnectionError, ServerError};
use perf::PerfMonitor;
use player::{Player, PlayerRegistry};
use tick::TickScheduler;

/// Ties every subsystem together. Constructed once by `craftd`'s `main`,
/// passed around as `Arc<Server>` so the acceptor, the tick thread and any
/// console/admin surface all share one instance rather than reaching for
/// globals.
pub struct Server {
    config: Mutex<Config>,
    registry: PacketRegistry,
    acceptor: Mutex<Acceptor>,
    pending_login: Mutex<HashMap<SocketAddr, (String, Uuid)>>,
    play_connections: Mutex<HashMap<i32, Connection>>,
    players: PlayerRegistry,
    entities: EntityTable,
    chunks: Arc<ChunkStore>,
    perf: PerfMonitor,
    last_save: Mutex<Instant>,
    running: AtomicBool,
}

impl Server {
    pub fn new(config: Config) -> Result<Arc<Self>, ServerError> {
        let acceptor = Acceptor::bind(&config.bind_address())?;
        let worker_threads = match config.performance.worker_threads {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            n => n,
        };
        let pool = Arc::new(WorkerPool::new(worker_threads));
        let chunks = Arc::new(ChunkStore::new(config.world.name.clone(), pool.clone()));
        tracing::info!(address = %acceptor.local_addr()?, "server listening");
        Ok(Arc::new(Self {
            config: Mutex::new(config),
            registry: PacketRegistry::new(),
            acceptor: Mutex::new(acceptor),
            pending_login: Mutex::new(HashMap::new()),
            play_connections: Mutex::new(HashMap::new()),
            players: PlayerRegistry::new(),
            entities: EntityTable::default(),
            chunks,
            perf: PerfMonitor::new(),
            last_save: Mutex::new(Instant::now()),
            running: AtomicBool::new(true),
        }))
    }

    fn config(&self) -> Config {
        self.config.lock().unwrap().clone()
    }

    pub fn reload_config(&self, config: Config) {
        *self.config.lock().unwrap() = config;
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn status(&self) -> StatusResponse {
        let config = self.config();
        StatusResponse::new(config.server.motd, config.server.max_players, self.players.len() as u32)
    }

    pub fn broadcast<T: ClientboundEncode>(&self, packet: &T) {
        self.players.broadcast(packet);
    }

    /// Kicks a connected player by name. Returns `false` if no such player
    /// is connected.
    pub fn kick(&self, name: &str, reason: &str) -> bool {
        match self.players.by_name(name) {
            Some(player) => {
                player.kick(reason);
                true
            }
            None => false,
        }
    }

    pub fn perf(&self) -> &PerfMonitor {
        &self.perf
    }

    pub fn acceptor_stats(&self) -> acceptor::AcceptorStats {
        self.acceptor.lock().unwrap().stats(self.players.len())
    }

    /// Runs the 20Hz game loop until [`Server::stop`] is called. Blocks the
    /// calling thread.
    pub fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let mut scheduler = TickScheduler::new();
        while self.is_running() {
            let start = Instant::now();
            self.run_tick();
            self.perf.record_tick(start.elapsed());
            scheduler.wait_for_next_tick();
        }
        self.chunks.save_all();
        Ok(())
    }

    fn run_tick(self: &Arc<Self>) {
        tick::run_isolated("preplay", || self.pump_preplay());
        tick::run_isolated("play-packets", || self.pump_play_connections());
        tick::run_isolated("chunk-view", || self.update_chunk_views());
        tick::run_isolated("entities", || self.entities.tick_all());
        tick::run_isolated("world", || self.world_tick());
        tick::run_isolated("cleanup", || self.cleanup_offline());
        tick::run_isolated("perf-io", || self.harvest_connection_io());
    }

    /// Drains the per-connection outbound counters (see
    /// `Connection::take_io_stats`) into the shared [`PerfMonitor`].
    fn harvest_connection_io(&self) {
        let mut frames = 0u64;
        let mut bytes = 0u64;
        for connection in self.acceptor.lock().unwrap().connecting() {
            let (f, b) = connection.take_io_stats();
            frames += f;
            bytes += b;
        }
        for connection in self.play_connections.lock().unwrap().values() {
            let (f, b) = connection.take_io_stats();
            frames += f;
            bytes += b;
        }
        if frames > 0 {
            self.perf.record_packets_out(frames, bytes);
        }
    }

    fn pump_preplay(self: &Arc<Self>) {
        let mut acceptor = self.acceptor.lock().unwrap();
        let accepted_before = acceptor.accepted_total();
        acceptor.accept_pending();
        for _ in 0..(acceptor.accepted_total() - accepted_before) {
            self.perf.record_connection();
        }
        acceptor.maybe_run_janitor();

        let mut ready_peers = std::collections::HashSet::new();
        for connection in acceptor.connecting() {
            match self.service_connecting(connection) {
                Ok(true) => {
                    ready_peers.insert(connection.peer);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(peer = %connection.peer, %err, "handshake error, closing");
                    connection.close();
                }
            }
        }
        acceptor.drop_closed();
        let ready = acceptor.take_ready(|c| ready_peers.contains(&c.peer));
        drop(acceptor);

        for connection in ready {
            self.promote_to_play(connection);
        }
    }

    /// Services one pre-`Play` connection: reads at most one frame and
    /// reacts to it. Returns `Ok(true)` once login has completed and the
    /// connection is ready to be promoted into the player registry.
    fn service_connecting(&self, connection: &Connection) -> Result<bool, ConnectionError> {
        let Some(mut body) = connection.poll()? else {
            return Ok(false);
        };
        self.perf.record_packet_in(body.remaining());
        let id = body.read_varint().map_err(craft_protocol::ProtocolError::from)?;
        let phase = connection.phase();
        let Some(packet) = self.registry.decode_serverbound(phase, id, &mut body)? else {
            return Ok(false);
        };

        match packet {
            ServerboundPacket::Handshake(handshake) => {
                if handshake.protocol_version != craft_protocol::PROTOCOL_VERSION {
                    connection.close();
                    return Err(ConnectionError::from(craft_protocol::ProtocolError::VersionMismatch {
                        expected: craft_protocol::PROTOCOL_VERSION,
                        found: handshake.protocol_version,
                    }));
                }
                let next = match handshake.next_state {
                    NextState::Status => Phase::Status,
                    NextState::Login => Phase::Login,
                };
                connection.set_phase(next);
                Ok(false)
            }
            ServerboundPacket::StatusRequest(_) => {
                connection.sender().send(&self.status())?;
                Ok(false)
            }
            ServerboundPacket::PingRequest(ping) => {
                connection
                    .sender()
                    .send(&PingResponse { payload: ping.payload })?;
                connection.close();
                Ok(false)
            }
            ServerboundPacket::LoginStart(login) => {
                if !is_valid_username(&login.name) {
                    connection.close();
                    return Err(ConnectionError::Policy(format!("invalid username {:?}", login.name)));
                }
                let config = self.config();
                let uuid = if config.server.online_mode {
                    login.uuid
                } else {
                    Uuid::offline_player(&login.name)
                };
                if self.players.by_name(&login.name).is_some() {
                    tracing::info!(name = %login.name, "already online");
                    connection.close();
                    return Err(ConnectionError::Policy("duplicate login: username already online".to_owned()));
                }
                if self.players.by_uuid(&uuid).is_some() {
                    tracing::info!(name = %login.name, "duplicate uuid");
                    connection.close();
                    return Err(ConnectionError::Policy("duplicate login: uuid already online".to_owned()));
                }
                if self.players.len() >= config.server.max_players as usize {
                    tracing::info!(name = %login.name, "server full");
                    connection.close();
                    return Err(ConnectionError::Policy("server full".to_owned()));
                }
                connection.sender().send(&LoginSuccess {
                    uuid,
                    name: login.name.clone(),
                })?;
                self.pending_login
                    .lock()
                    .unwrap()
                    .insert(connection.peer, (login.name, uuid));
                connection.set_phase(Phase::Play);
                Ok(true)
            }
            // Neither packet is legal before Play; the registry only ever
            // hands these back when `phase` already reports Play, so this
            // arm is unreachable in practice but kept exhaustive.
            ServerboundPacket::KeepAlive(_) | ServerboundPacket::PlayerPosition(_) => Ok(false),
        }
    }

    fn promote_to_play(&self, connection: Connection) {
        let Some((name, uuid)) = self.pending_login.lock().unwrap().remove(&connection.peer) else {
            connection.close();
            return;
        };
        let config = self.config();
        let entity_id = entity::next_entity_id();
        let sender = connection.sender();

        let join_game = JoinGame {
            entity_id,
            hardcore: config.server.hardcore,
            gamemode: 0,
            previous_gamemode: 255,
            worlds: vec!["minecraft:overworld".to_owned()],
            dimension_type: "minecraft:overworld".to_owned(),
            dimension_name: "minecraft:overworld".to_owned(),
            seed: config.world.seed,
            max_players: config.server.max_players as i32,
            view_distance: config.server.view_distance,
            simulation_distance: config.server.simulation_distance,
            reduced_debug_info: false,
            enable_respawn_screen: true,
            is_debug: false,
            is_flat: true,
            has_death_location: false,
        };
        if let Err(err) = sender.send(&join_game) {
            tracing::warn!(%name, %err, "failed to send join game, dropping connection");
            return;
        }
        // teleport_id is always 1; the server never expects a TeleportConfirm back.
        let teleport = PlayerPositionAndLook {
            x: config.world.spawn_x,
            y: config.world.spawn_y,
            z: config.world.spawn_z,
            yaw: 0.0,
            pitch: 0.0,
            flags: 0,
            teleport_id: 1,
            dismount_vehicle: false,
        };
        if let Err(err) = sender.send(&teleport) {
            tracing::warn!(%name, %err, "failed to send spawn teleport, dropping connection");
            return;
        }

        let player = Arc::new(Player::new(entity_id, uuid, name.clone(), sender, config.server.view_distance));
        player.set_position(entity::Vec3 {
            x: config.world.spawn_x,
            y: config.world.spawn_y,
            z: config.world.spawn_z,
        });
        self.players.add(player);
        self.play_connections.lock().unwrap().insert(entity_id, connection);
        tracing::info!(player = %name, entity_id, "player joined");
    }

    fn pump_play_connections(&self) {
        let connections = self.play_connections.lock().unwrap();
        for (&entity_id, connection) in connections.iter() {
            if let Err(err) = self.service_play_connection(entity_id, connection) {
                tracing::debug!(entity_id, %err, "play connection error");
                connection.close();
            }
        }
        drop(connections);

        let disconnected: Vec<i32> = {
            let connections = self.play_connections.lock().unwrap();
            connections
                .iter()
                .filter(|(_, c)| c.is_closed())
                .map(|(&id, _)| id)
                .collect()
        };
        for entity_id in disconnected {
            self.play_connections.lock().unwrap().remove(&entity_id);
            if let Some(player) = self.players.remove(entity_id) {
                tracing::info!(player = %player.name, "player disconnected");
            }
        }
    }

    fn service_play_connection(&self, entity_id: i32, connection: &Connection) -> Result<(), ConnectionError> {
        let Some(player) = self.players.by_entity_id(entity_id) else {
            return Ok(());
        };

        while let Some(mut body) = connection.poll()? {
            self.perf.record_packet_in(body.remaining());
            let id = body.read_varint().map_err(craft_protocol::ProtocolError::from)?;
            let Some(packet) = self
                .registry
                .decode_serverbound(Phase::Play, id, &mut body)?
            else {
                continue;
            };
            match packet {
                ServerboundPacket::PlayerPosition(PlayerPosition { x, y, z, .. }) => {
                    player.set_position(entity::Vec3 { x, y, z });
                }
                ServerboundPacket::KeepAlive(keep_alive) => {
                    connection.record_keep_alive_response(keep_alive.id);
                    player.touch();
                }
                _ => {}
            }
        }

        if connection.is_keep_alive_timed_out() {
            player.kick("timed out");
        } else {
            let _ = connection.maybe_send_keep_alive(player.connection());
        }
        Ok(())
    }

    fn update_chunk_views(&self) {
        for player in self.players.all() {
            if let Err(err) = player.update_chunk_view(&self.chunks) {
                tracing::debug!(player = %player.name, %err, "chunk view update failed");
                player.kick("connection error");
            }
        }
    }

    fn world_tick(&self) {
        let config = self.config();
        let save_interval = std::time::Duration::from_millis(config.performance.auto_save_interval);
        let mut last_save = self.last_save.lock().unwrap();
        if last_save.elapsed() >= save_interval {
            self.chunks.save_all();
            *last_save = Instant::now();
        }
        drop(last_save);
        self.chunks.evict_idle(
            std::time::Duration::from_secs(config.performance.chunk_unload_timeout),
            config.performance.max_chunks_loaded,
        );
    }

    fn cleanup_offline(&self) {
        for player in self.players.cleanup_offline() {
            self.play_connections.lock().unwrap().remove(&player.entity_id);
            tracing::info!(player = %player.name, "removed idle player");
        }
    }
}
