//! In-memory chunk representation: 24 stacked 16x16x16 sections spanning
//! world y -64..320, each paletted against the global block registry.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use craft_util::Buffer;

use crate::block::{registry, Block};
use crate::packed_array::PackedArray;

pub const SECTION_WIDTH: usize = 16;
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH;
pub const SECTIONS_PER_CHUNK: usize = 24;
pub const WORLD_MIN_Y: i32 = -64;
pub const WORLD_HEIGHT: i32 = 384;

fn section_index(x: u8, y: u8, z: u8) -> usize {
    (y as usize) << 8 | (z as usize) << 4 | (x as usize)
}

#[derive(Debug)]
pub struct ChunkSection {
    blocks: Box<[Block; SECTION_VOLUME]>,
    block_light: Box<[u8; SECTION_VOLUME / 2]>,
    sky_light: Box<[u8; SECTION_VOLUME / 2]>,
    non_air: AtomicU16,
}

impl ChunkSection {
    pub fn empty() -> Self {
        Self {
            blocks: Box::new([Block::AIR; SECTION_VOLUME]),
            block_light: Box::new([0; SECTION_VOLUME / 2]),
            sky_light: Box::new([0xFF; SECTION_VOLUME / 2]),
            non_air: AtomicU16::new(0),
        }
    }

    pub fn get(&self, x: u8, y: u8, z: u8) -> Block {
        self.blocks[section_index(x, y, z)]
    }

    pub fn set(&mut self, x: u8, y: u8, z: u8, block: Block) {
        let idx = section_index(x, y, z);
        let was_air = self.blocks[idx] == Block::AIR;
        let is_air = block == Block::AIR;
        self.blocks[idx] = block;
        match (was_air, is_air) {
            (true, false) => {
                self.non_air.fetch_add(1, Ordering::Relaxed);
            }
            (false, true) => {
                self.non_air.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.non_air.load(Ordering::Relaxed) == 0
    }

    fn block_count(&self) -> u16 {
        self.non_air.load(Ordering::Relaxed)
    }

    fn encode(&self, buf: &mut Buffer) {
        buf.write_i16(self.block_count() as i16);
        let bits = PackedArray::bits_for_max((registry().len().max(1) - 1) as u64).max(1);
        let mut packed = PackedArray::new(bits, SECTION_VOLUME);
        for (i, block) in self.blocks.iter().enumerate() {
            packed.set(i, block.0 as u64);
        }
        buf.write_u8(bits);
        buf.write_varint(packed.words().len() as i32);
        for word in packed.words() {
            buf.write_u64(*word);
        }
        buf.write_bytes(self.block_light.as_ref());
        buf.write_bytes(self.sky_light.as_ref());
    }

    fn decode(buf: &mut Buffer) -> Result<Self, craft_util::BufferError> {
        let _block_count = buf.read_i16()?;
        let bits = buf.read_u8()?;
        let word_count = buf.read_varint()? as usize;
        let mut words = vec![0u64; word_count];
        for word in words.iter_mut() {
            *word = buf.read_u64()?;
        }
        let packed = PackedArray::from_words(words.into_boxed_slice(), bits, SECTION_VOLUME);
        let mut section = Self::empty();
        for i in 0..SECTION_VOLUME {
            let block = Block(packed.get(i) as i32);
            if block != Block::AIR {
                section.non_air.fetch_add(1, Ordering::Relaxed);
            }
            section.blocks[i] = block;
        }
        section
            .block_light
            .copy_from_slice(&buf.read_bytes(SECTION_VOLUME / 2)?);
        section
            .sky_light
            .copy_from_slice(&buf.read_bytes(SECTION_VOLUME / 2)?);
        Ok(section)
    }
}

/// A loaded 16x384x16 column. `sections[0]` covers y -64..-48.
#[derive(Debug)]
pub struct Chunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
    sections: Mutex<[ChunkSection; SECTIONS_PER_CHUNK]>,
    dirty: AtomicBool,
    last_access: Mutex<Instant>,
}

fn section_for_y(y: i32) -> Option<(usize, u8)> {
    if y < WORLD_MIN_Y || y >= WORLD_MIN_Y + WORLD_HEIGHT {
        return None;
    }
    let offset = (y - WORLD_MIN_Y) as usize;
    Some((offset / SECTION_WIDTH, (offset % SECTION_WIDTH) as u8))
}

impl Chunk {
    pub fn new_empty(chunk_x: i32, chunk_z: i32) -> Self {
        Self {
            chunk_x,
            chunk_z,
            sections: Mutex::new(std::array::from_fn(|_| ChunkSection::empty())),
            dirty: AtomicBool::new(false),
            last_access: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_access.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_access.lock().unwrap().elapsed()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }

    pub fn get_block(&self, x: u8, y: i32, z: u8) -> Block {
        match section_for_y(y) {
            Some((section, local_y)) => self.sections.lock().unwrap()[section].get(x, local_y, z),
            None => Block::AIR,
        }
    }

    pub fn set_block(&self, x: u8, y: i32, z: u8, block: Block) -> bool {
        let Some((section, local_y)) = section_for_y(y) else {
            return false;
        };
        self.sections.lock().unwrap()[section].set(x, local_y, z, block);
        self.dirty.store(true, Ordering::Relaxed);
        true
    }

    /// Serializes every section top to bottom; this is the byte blob carried
    /// both by `ChunkData` on the wire and by region-file storage on disk.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Buffer::new();
        let sections = self.sections.lock().unwrap();
        for section in sections.iter() {
            section.encode(&mut buf);
        }
        buf.into_vec()
    }

    pub fn decode(chunk_x: i32, chunk_z: i32, bytes: Vec<u8>) -> Result<Self, craft_util::BufferError> {
        let mut buf = Buffer::from_vec(bytes);
        let mut sections: Vec<ChunkSection> = Vec::with_capacity(SECTIONS_PER_CHUNK);
        for _ in 0..SECTIONS_PER_CHUNK {
            sections.push(ChunkSection::decode(&mut buf)?);
        }
        let sections: [ChunkSection; SECTIONS_PER_CHUNK] = sections
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly SECTIONS_PER_CHUNK were pushed"));
        Ok(Self {
            chunk_x,
            chunk_z,
            sections: Mutex::new(sections),
            dirty: AtomicBool::new(false),
            last_access: Mutex::new(Instant::now()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_chunk_is_all_air() {
        let chunk = Chunk::new_empty(0, 0);
        assert_eq!(chunk.get_block(0, -64, 0), Block::AIR);
        assert_eq!(chunk.get_block(15, 319, 15), Block::AIR);
    }

    #[test]
    fn set_then_get_roundtrips_and_marks_dirty() {
        let chunk = Chunk::new_empty(2, -3);
        let stone = registry().by_name("minecraft:stone").unwrap();
        assert!(chunk.set_block(4, 70, 9, stone));
        assert_eq!(chunk.get_block(4, 70, 9), stone);
        assert!(chunk.is_dirty());
    }

    #[test]
    fn out_of_range_y_is_rejected() {
        let chunk = Chunk::new_empty(0, 0);
        assert!(!chunk.set_block(0, 1000, 0, Block::AIR));
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn encode_decode_roundtrips_blocks() {
        let chunk = Chunk::new_empty(5, 5);
        let stone = registry().by_name("minecraft:stone").unwrap();
        chunk.set_block(1, 0, 1, stone);
        chunk.set_block(10, 300, 3, stone);
        let bytes = chunk.encode();
        let restored = Chunk::decode(5, 5, bytes).unwrap();
        assert_eq!(restored.get_block(1, 0, 1), stone);
        assert_eq!(restored.get_block(10, 300, 3), stone);
        assert_eq!(restored.get_block(0, 0, 0), Block::AIR);
    }
}
