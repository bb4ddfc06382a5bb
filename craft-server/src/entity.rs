//! Server-simulated entities. Ids are allocated from a dedicated range above
//! the player id space so the two never collide; the table keeps a
//! chunk-coordinate index alongside the flat map so "entities near this
//! chunk" queries don't scan everything.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

const FIRST_ENTITY_ID: i32 = 10_000;
static NEXT_ENTITY_ID: AtomicI32 = AtomicI32::new(FIRST_ENTITY_ID);

pub fn next_entity_id() -> i32 {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

const GRAVITY_PER_TICK: f64 = 0.08;
const VERTICAL_DRAG: f64 = 0.98;
const HORIZONTAL_DRAG: f64 = 0.91;
const VELOCITY_SNAP: f64 = 0.01;

/// Ticks after death before a corpse is dropped from the table.
const DEATH_REMOVAL_DELAY: u32 = 20;

/// Upper bound on resident entities, independent of the player count.
pub const DEFAULT_MAX_ENTITIES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    fn snap_small_components(&mut self) {
        for v in [&mut self.x, &mut self.y, &mut self.z] {
            if v.abs() < VELOCITY_SNAP {
                *v = 0.0;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: i32,
    pub kind: i32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
    pub no_gravity: bool,
    pub health: f32,
    pub max_health: f32,
    pub hurt_timer: u32,
    pub death_timer: u32,
}

impl Entity {
    pub fn new(kind: i32, position: Vec3) -> Self {
        Self {
            id: next_entity_id(),
            kind,
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            on_ground: false,
            no_gravity: false,
            health: 20.0,
            max_health: 20.0,
            hurt_timer: 0,
            death_timer: 0,
        }
    }

    pub fn chunk_coord(&self) -> (i32, i32) {
        (
            (self.position.x as i32).div_euclid(16),
            (self.position.z as i32).div_euclid(16),
        )
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// True once a dead entity has sat in the table for
    /// [`DEATH_REMOVAL_DELAY`] ticks and can be dropped.
    pub fn should_remove(&self) -> bool {
        self.death_timer >= DEATH_REMOVAL_DELAY
    }

    /// Advances one 50ms tick: apply gravity and vertical drag, integrate
    /// velocity into position, clamp to the world floor, decay horizontal
    /// velocity, and snap near-zero components to zero.
    pub fn tick(&mut self) {
        if !self.no_gravity {
            self.velocity.y = (self.velocity.y - GRAVITY_PER_TICK) * VERTICAL_DRAG;
        }

        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;
        self.position.z += self.velocity.z;

        if self.position.y <= craft_world::WORLD_MIN_Y as f64 {
            self.position.y = craft_world::WORLD_MIN_Y as f64;
            self.velocity.y = 0.0;
            self.on_ground = true;
        } else {
            self.on_ground = false;
        }

        self.velocity.x *= HORIZONTAL_DRAG;
        self.velocity.z *= HORIZONTAL_DRAG;
        self.velocity.snap_small_components();

        if self.hurt_timer > 0 {
            self.hurt_timer -= 1;
        }
        if self.is_dead() {
            self.death_timer += 1;
        }
    }
}

/// All server-simulated entities, indexed both by id and by the chunk
/// column they currently occupy.
pub struct EntityTable {
    entities: Mutex<HashMap<i32, Entity>>,
    by_chunk: Mutex<HashMap<(i32, i32), HashSet<i32>>>,
    max_entities: usize,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTITIES)
    }
}

impl EntityTable {
    pub fn new(max_entities: usize) -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            by_chunk: Mutex::new(HashMap::new()),
            max_entities,
        }
    }

    /// Inserts `entity`, rejecting it once the table is at `max_entities`.
    pub fn spawn(&self, entity: Entity) -> Option<i32> {
        let id = entity.id;
        let chunk = entity.chunk_coord();
        let mut entities = self.entities.lock().unwrap();
        if entities.len() >= self.max_entities {
            return None;
        }
        entities.insert(id, entity);
        drop(entities);
        self.by_chunk.lock().unwrap().entry(chunk).or_default().insert(id);
        Some(id)
    }

    pub fn remove(&self, id: i32) -> Option<Entity> {
        let removed = self.entities.lock().unwrap().remove(&id);
        if let Some(entity) = &removed {
            let chunk = entity.chunk_coord();
            if let Some(set) = self.by_chunk.lock().unwrap().get_mut(&chunk) {
                set.remove(&id);
            }
        }
        removed
    }

    pub fn get(&self, id: i32) -> Option<Entity> {
        self.entities.lock().unwrap().get(&id).cloned()
    }

    pub fn entities_in_chunk(&self, chunk_x: i32, chunk_z: i32) -> Vec<i32> {
        self.by_chunk
            .lock()
            .unwrap()
            .get(&(chunk_x, chunk_z))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the entity set out from under the lock, ticks each entity
    /// without holding it, drops any that have become removable, then
    /// rebuilds the chunk index from what's left.
    pub fn tick_all(&self) {
        let mut snapshot: Vec<Entity> = self.entities.lock().unwrap().values().cloned().collect();
        for entity in &mut snapshot {
            entity.tick();
        }
        snapshot.retain(|entity| !entity.should_remove());

        let mut entities = self.entities.lock().unwrap();
        let mut by_chunk = self.by_chunk.lock().unwrap();
        entities.clear();
        by_chunk.clear();
        for entity in snapshot {
            by_chunk.entry(entity.chunk_coord()).or_default().insert(entity.id);
            entities.insert(entity.id, entity);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spawned_entities_are_indexed_by_chunk() {
        let table = EntityTable::default();
        let id = table.spawn(Entity::new(0, Vec3 { x: 17.0, y: 64.0, z: 3.0 })).unwrap();
        assert_eq!(table.entities_in_chunk(1, 0), vec![id]);
    }

    #[test]
    fn spawn_is_rejected_once_the_table_is_full() {
        let table = EntityTable::new(1);
        assert!(table.spawn(Entity::new(0, Vec3::ZERO)).is_some());
        assert!(table.spawn(Entity::new(0, Vec3::ZERO)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn a_dead_entity_is_removed_after_the_death_delay() {
        let table = EntityTable::default();
        let mut entity = Entity::new(0, Vec3::ZERO);
        entity.health = 0.0;
        let id = table.spawn(entity).unwrap();
        for _ in 0..DEATH_REMOVAL_DELAY - 1 {
            table.tick_all();
            assert!(table.get(id).is_some());
        }
        table.tick_all();
        assert!(table.get(id).is_none());
    }

    #[test]
    fn falling_entity_stops_at_world_floor() {
        let mut entity = Entity::new(0, Vec3 { x: 0.0, y: craft_world::WORLD_MIN_Y as f64 + 0.01, z: 0.0 });
        entity.velocity.y = -1.0;
        for _ in 0..5 {
            entity.tick();
        }
        assert_eq!(entity.position.y, craft_world::WORLD_MIN_Y as f64);
        assert!(entity.on_ground);
    }

    #[test]
    fn crossing_a_chunk_boundary_reindexes() {
        let table = EntityTable::default();
        let id = table.spawn(Entity::new(0, Vec3 { x: 15.5, y: 64.0, z: 0.0 })).unwrap();
        {
            let mut entities = table.entities.lock().unwrap();
            entities.get_mut(&id).unwrap().velocity.x = 1.0;
        }
        table.tick_all();
        assert!(table.entities_in_chunk(1, 0).contains(&id));
        assert!(!table.entities_in_chunk(0, 0).contains(&id));
    }

    #[test]
    fn entity_ids_start_above_the_player_range() {
        let entity = Entity::new(0, Vec3::ZERO);
        assert!(entity.id >= FIRST_ENTITY_ID);
    }
}
