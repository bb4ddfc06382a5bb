//! Deterministic flat-world generation. No noise, no biomes: a handful of
//! solid layers and a bedrock floor, enough to give a freshly generated
//! chunk believable contents without touching real worldgen.

use crate::block::registry;
use crate::chunk::Chunk;

#[derive(Debug, Clone)]
pub struct FlatGenerator {
    layers: Vec<(&'static str, i32)>,
}

impl FlatGenerator {
    pub fn new() -> Self {
        Self {
            layers: vec![
                ("minecraft:bedrock", 1),
                ("minecraft:dirt", 3),
                ("minecraft:grass_block", 1),
            ],
        }
    }

    pub fn generate(&self, chunk_x: i32, chunk_z: i32) -> Chunk {
        let chunk = Chunk::new_empty(chunk_x, chunk_z);
        let mut y = -64i32;
        for (name, thickness) in &self.layers {
            let Some(block) = registry().by_name(name) else {
                continue;
            };
            for _ in 0..*thickness {
                for x in 0..16u8 {
                    for z in 0..16u8 {
                        chunk.set_block(x, y, z, block);
                    }
                }
                y += 1;
            }
        }
        chunk.clear_dirty();
        chunk
    }
}

impl Default for FlatGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bottom_layer_is_bedrock() {
        let chunk = FlatGenerator::new().generate(0, 0);
        let bedrock = registry().by_name("minecraft:bedrock").unwrap();
        assert_eq!(chunk.get_block(0, -64, 0), bedrock);
    }

    #[test]
    fn surface_layer_is_grass() {
        let chunk = FlatGenerator::new().generate(1, -2);
        let grass = registry().by_name("minecraft:grass_block").unwrap();
        assert_eq!(chunk.get_block(5, -60, 5), grass);
    }

    #[test]
    fn above_surface_is_air() {
        let chunk = FlatGenerator::new().generate(0, 0);
        assert_eq!(chunk.get_block(0, 0, 0), crate::block::Block::AIR);
    }

    #[test]
    fn freshly_generated_chunk_is_not_dirty() {
        let chunk = FlatGenerator::new().generate(0, 0);
        assert!(!chunk.is_dirty());
    }
}
