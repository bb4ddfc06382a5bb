//! A minimal, fixed block palette. Real vanilla data packs thousands of
//! block states; this keeps just enough states to exercise generation,
//! persistence and the wire format, populated once at process start and
//! never mutated afterwards.

use std::sync::OnceLock;

/// A block state id as it appears on the wire and in chunk sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Block(pub i32);

impl Block {
    pub const AIR: Block = Block(0);

    pub fn info(self) -> &'static BlockInfo {
        registry().get(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub name: &'static str,
    pub solid: bool,
    pub transparent: bool,
    pub hardness: f32,
    pub light_emission: u8,
}

const UNKNOWN: BlockInfo = BlockInfo {
    name: "minecraft:air",
    solid: false,
    transparent: true,
    hardness: 0.0,
    light_emission: 0,
};

/// Ordered by state id; index 0 must be air.
const TABLE: &[BlockInfo] = &[
    BlockInfo {
        name: "minecraft:air",
        solid: false,
        transparent: true,
        hardness: 0.0,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:stone",
        solid: true,
        transparent: false,
        hardness: 1.5,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:grass_block",
        solid: true,
        transparent: false,
        hardness: 0.6,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:dirt",
        solid: true,
        transparent: false,
        hardness: 0.5,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:bedrock",
        solid: true,
        transparent: false,
        hardness: -1.0,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:water",
        solid: false,
        transparent: true,
        hardness: 100.0,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:glass",
        solid: true,
        transparent: true,
        hardness: 0.3,
        light_emission: 0,
    },
    BlockInfo {
        name: "minecraft:glowstone",
        solid: true,
        transparent: false,
        hardness: 0.3,
        light_emission: 15,
    },
];

pub struct BlockRegistry {
    table: &'static [BlockInfo],
}

impl BlockRegistry {
    fn get(&self, block: Block) -> &'static BlockInfo {
        self.table
            .get(block.0 as usize)
            .unwrap_or(&UNKNOWN)
    }

    pub fn by_name(&self, name: &str) -> Option<Block> {
        self.table
            .iter()
            .position(|info| info.name == name)
            .map(|idx| Block(idx as i32))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

static REGISTRY: OnceLock<BlockRegistry> = OnceLock::new();

pub fn registry() -> &'static BlockRegistry {
    REGISTRY.get_or_init(|| BlockRegistry { table: TABLE })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn air_is_not_solid() {
        assert!(!Block::AIR.info().solid);
    }

    #[test]
    fn stone_is_solid_and_opaque() {
        let stone = registry().by_name("minecraft:stone").unwrap();
        assert!(stone.info().solid);
        assert!(!stone.info().transparent);
    }

    #[test]
    fn glowstone_emits_light() {
        let glowstone = registry().by_name("minecraft:glowstone").unwrap();
        assert_eq!(glowstone.info().light_emission, 15);
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert!(registry().by_name("minecraft:does_not_exist").is_none());
    }

    #[test]
    fn out_of_range_id_falls_back_to_unknown_info() {
        let bogus = Block(9999);
        assert_eq!(bogus.info().name, "minecraft:air");
    }
}
