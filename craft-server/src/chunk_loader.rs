//! Disc-shaped chunk view around a moving center, diffed each update into
//! load/unload work. The loaded set is always exactly the disc of the
//! configured radius around the current center, nothing wider.

use std::collections::HashSet;

use craft_util::retain_returned_hashset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    fn distance_sq(&self, other: &ChunkPos) -> i64 {
        let dx = (other.x - self.x) as i64;
        let dz = (other.z - self.z) as i64;
        dx * dx + dz * dz
    }
}

fn disc(center: ChunkPos, radius: i32) -> impl Iterator<Item = ChunkPos> {
    let radius_sq = (radius as i64) * (radius as i64);
    (-radius..=radius)
        .flat_map(move |dx| (-radius..=radius).map(move |dz| (dx, dz)))
        .map(move |(dx, dz)| ChunkPos::new(center.x + dx, center.z + dz))
        .filter(move |p| center.distance_sq(p) <= radius_sq)
}

/// Tracks which chunks a viewer currently has loaded and produces the
/// minimal load/unload delta as the center moves or the radius changes.
#[derive(Debug, Default)]
pub struct ChunkView {
    center: Option<ChunkPos>,
    radius: i32,
    loaded: HashSet<ChunkPos>,
}

impl ChunkView {
    pub fn new(radius: i32) -> Self {
        Self {
            center: None,
            radius,
            loaded: HashSet::new(),
        }
    }

    /// Recomputes the view for a new center, returning `(to_load,
    /// to_unload)` sorted closest-first so streaming favors what the player
    /// can see soonest.
    pub fn update(&mut self, center: ChunkPos) -> (Vec<ChunkPos>, Vec<ChunkPos>) {
        if self.center == Some(center) {
            return (Vec::new(), Vec::new());
        }
        self.center = Some(center);

        let radius_sq = (self.radius as i64) * (self.radius as i64);
        let mut to_unload = retain_returned_hashset(&mut self.loaded, |chunk| {
            center.distance_sq(chunk) <= radius_sq
        });
        to_unload.sort_by_key(|c| std::cmp::Reverse(center.distance_sq(c)));

        let mut to_load: Vec<ChunkPos> = disc(center, self.radius)
            .filter(|chunk| !self.loaded.contains(chunk))
            .collect();
        to_load.sort_by_key(|c| center.distance_sq(c));
        self.loaded.extend(to_load.iter().copied());

        (to_load, to_unload)
    }

    pub fn unload_all(&mut self) -> Vec<ChunkPos> {
        self.center = None;
        self.loaded.drain().collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_update_loads_the_whole_disc_and_unloads_nothing() {
        let mut view = ChunkView::new(2);
        let (to_load, to_unload) = view.update(ChunkPos::new(0, 0));
        assert!(to_unload.is_empty());
        assert!(to_load.contains(&ChunkPos::new(0, 0)));
        assert!(to_load.iter().all(|c| (c.x * c.x + c.z * c.z) as i64 <= 4));
    }

    #[test]
    fn small_move_does_not_unload_everything() {
        let mut view = ChunkView::new(3);
        view.update(ChunkPos::new(0, 0));
        let (_to_load, to_unload) = view.update(ChunkPos::new(1, 0));
        assert!(to_unload.len() < view.loaded_count());
    }

    #[test]
    fn same_center_is_a_no_op() {
        let mut view = ChunkView::new(2);
        view.update(ChunkPos::new(5, 5));
        let (to_load, to_unload) = view.update(ChunkPos::new(5, 5));
        assert!(to_load.is_empty());
        assert!(to_unload.is_empty());
    }

    #[test]
    fn loaded_set_is_exactly_the_radius_disc_after_a_move() {
        let mut view = ChunkView::new(2);
        view.update(ChunkPos::new(0, 0));
        view.update(ChunkPos::new(5, 0));
        let expected: HashSet<ChunkPos> = disc(ChunkPos::new(5, 0), 2).collect();
        assert_eq!(view.loaded, expected);
    }

    #[test]
    fn closest_chunks_come_first_in_load_order() {
        let mut view = ChunkView::new(4);
        let (to_load, _) = view.update(ChunkPos::new(0, 0));
        let center = ChunkPos::new(0, 0);
        let distances: Vec<i64> = to_load.iter().map(|c| center.distance_sq(c)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }
}
