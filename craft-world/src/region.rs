//! Region-file persistence. Each `r.<rx>.<rz>.mca` file holds a 32x32 grid
//! of chunks behind an 8KiB header: a 4KiB location table (sector offset +
//! sector count per chunk) followed by a 4KiB last-saved-timestamp table.
//! Unlike vanilla's Anvil format this stores raw, uncompressed chunk bytes:
//! there is no NBT and no zlib here.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use craft_util::ReadExt as _;

pub const REGION_SIZE: i32 = 32;
pub const SECTOR_SIZE: u64 = 4096;
const LOCATION_TABLE_SECTORS: u64 = 1;
const TIMESTAMP_TABLE_SECTORS: u64 = 1;
const HEADER_SECTORS: u64 = LOCATION_TABLE_SECTORS + TIMESTAMP_TABLE_SECTORS;

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("chunk payload at sector {sector} claims {claimed} bytes but only {available} are allocated")]
    Corrupt {
        sector: u32,
        claimed: u32,
        available: u32,
    },
}

fn region_coord(chunk_x: i32, chunk_z: i32) -> (i32, i32) {
    (chunk_x.div_euclid(REGION_SIZE), chunk_z.div_euclid(REGION_SIZE))
}

fn local_index(chunk_x: i32, chunk_z: i32) -> usize {
    let local_x = chunk_x.rem_euclid(REGION_SIZE) as usize;
    let local_z = chunk_z.rem_euclid(REGION_SIZE) as usize;
    local_x + local_z * REGION_SIZE as usize
}

struct RegionFile {
    file: File,
    /// (first sector, sector count); `(0, 0)` means unallocated.
    locations: Vec<(u32, u8)>,
    timestamps: Vec<u32>,
}

impl RegionFile {
    fn open(path: &Path) -> Result<Self, RegionError> {
        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let slots = (REGION_SIZE * REGION_SIZE) as usize;
        if is_new {
            file.set_len(HEADER_SECTORS * SECTOR_SIZE)?;
            return Ok(Self {
                file,
                locations: vec![(0, 0); slots],
                timestamps: vec![0; slots],
            });
        }

        file.rewind()?;
        let mut locations = Vec::with_capacity(slots);
        for _ in 0..slots {
            let raw: [u8; 4] = file.read_const()?;
            let sector = u32::from_be_bytes([0, raw[0], raw[1], raw[2]]);
            locations.push((sector, raw[3]));
        }
        file.seek(SeekFrom::Start(SECTOR_SIZE))?;
        let mut timestamps = Vec::with_capacity(slots);
        for _ in 0..slots {
            let raw: [u8; 4] = file.read_const()?;
            timestamps.push(u32::from_be_bytes(raw));
        }
        Ok(Self {
            file,
            locations,
            timestamps,
        })
    }

    fn write_header(&mut self) -> Result<(), RegionError> {
        self.file.rewind()?;
        for (sector, length) in &self.locations {
            let bytes = sector.to_be_bytes();
            self.file.write_all(&bytes[1..])?;
            self.file.write_all(&[*length])?;
        }
        self.file.seek(SeekFrom::Start(SECTOR_SIZE))?;
        for timestamp in &self.timestamps {
            self.file.write_all(&timestamp.to_be_bytes())?;
        }
        Ok(())
    }

    fn read(&mut self, index: usize) -> Result<Option<Vec<u8>>, RegionError> {
        let (sector, length_sectors) = self.locations[index];
        if sector == 0 || length_sectors == 0 {
            return Ok(None);
        }
        self.file
            .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE))?;
        let len_bytes: [u8; 4] = self.file.read_const()?;
        let len = u32::from_be_bytes(len_bytes);
        let available = length_sectors as u32 * SECTOR_SIZE as u32 - 4;
        if len > available {
            return Err(RegionError::Corrupt {
                sector,
                claimed: len,
                available,
            });
        }
        let data = self.file.read_var(len as usize)?;
        Ok(Some(data.into_vec()))
    }

    fn write(&mut self, index: usize, data: &[u8], timestamp: u32) -> Result<(), RegionError> {
        let needed_sectors = u64::div_ceil(4 + data.len() as u64, SECTOR_SIZE) as u8;
        let (existing_sector, existing_len) = self.locations[index];

        let sector = if existing_sector != 0 && existing_len >= needed_sectors {
            existing_sector
        } else {
            let file_len = self.file.metadata()?.len();
            let end_sector = (file_len / SECTOR_SIZE).max(HEADER_SECTORS) as u32;
            self.file
                .set_len((end_sector as u64 + needed_sectors as u64) * SECTOR_SIZE)?;
            end_sector
        };

        self.file
            .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE))?;
        self.file.write_all(&(data.len() as u32).to_be_bytes())?;
        self.file.write_all(data)?;
        let padding = needed_sectors as u64 * SECTOR_SIZE - 4 - data.len() as u64;
        if padding > 0 {
            self.file.write_all(&vec![0u8; padding as usize])?;
        }

        self.locations[index] = (sector, needed_sectors);
        self.timestamps[index] = timestamp;
        self.write_header()?;
        Ok(())
    }
}

/// Opens region files on demand under a world directory and keeps them
/// cached for the lifetime of the store.
pub struct RegionStore {
    directory: PathBuf,
    regions: HashMap<(i32, i32), RegionFile>,
}

impl RegionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            regions: HashMap::new(),
        }
    }

    fn region_path(&self, region_x: i32, region_z: i32) -> PathBuf {
        self.directory
            .join(format!("r.{region_x}.{region_z}.mca"))
    }

    fn region_mut(&mut self, chunk_x: i32, chunk_z: i32) -> Result<&mut RegionFile, RegionError> {
        let region = region_coord(chunk_x, chunk_z);
        if !self.regions.contains_key(&region) {
            std::fs::create_dir_all(&self.directory)?;
            let file = RegionFile::open(&self.region_path(region.0, region.1))?;
            self.regions.insert(region, file);
        }
        Ok(self.regions.get_mut(&region).unwrap())
    }

    pub fn load(&mut self, chunk_x: i32, chunk_z: i32) -> Result<Option<Vec<u8>>, RegionError> {
        let index = local_index(chunk_x, chunk_z);
        self.region_mut(chunk_x, chunk_z)?.read(index)
    }

    pub fn save(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
        data: &[u8],
        timestamp: u32,
    ) -> Result<(), RegionError> {
        let index = local_index(chunk_x, chunk_z);
        self.region_mut(chunk_x, chunk_z)?
            .write(index, data, timestamp)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_chunk_payload() {
        let dir = std::env::temp_dir().join(format!(
            "craft-region-test-{}",
            std::process::id()
        ));
        let mut store = RegionStore::new(&dir);
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        store.save(3, -2, &payload, 100).unwrap();
        let loaded = store.load(3, -2).unwrap().unwrap();
        assert_eq!(loaded, payload);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_chunk_is_none() {
        let dir = std::env::temp_dir().join(format!(
            "craft-region-test-missing-{}",
            std::process::id()
        ));
        let mut store = RegionStore::new(&dir);
        assert!(store.load(0, 0).unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rewriting_smaller_payload_reuses_sectors() {
        let dir = std::env::temp_dir().join(format!(
            "craft-region-test-reuse-{}",
            std::process::id()
        ));
        let mut store = RegionStore::new(&dir);
        store.save(0, 0, &vec![9u8; 5000], 1).unwrap();
        store.save(0, 0, &vec![1u8; 10], 2).unwrap();
        assert_eq!(store.load(0, 0).unwrap().unwrap(), vec![1u8; 10]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
