use std::fmt;

/// A 16-byte Minecraft profile UUID.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Offline-mode UUID derivation: `"OfflinePlayer:" + name` hashed with a
    /// 64-bit non-cryptographic hash, duplicated across both halves of the
    /// 16 bytes, with the version/variant nibbles forced to 3/8. This is a
    /// known-weak derivation (documented, not a bug) matching the source's
    /// behaviour of reusing one short hash rather than a full MD5 digest.
    pub fn offline_player(name: &str) -> Self {
        let hash = fnv1a64(format!("OfflinePlayer:{name}").as_bytes());
        let half = hash.to_be_bytes();
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&half);
        bytes[8..16].copy_from_slice(&half);
        // Version nibble (byte 6, high nibble) = 3.
        bytes[6] = (bytes[6] & 0x0F) | 0x30;
        // Variant nibble (byte 8, top two bits) = 10xx = 0x8.
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(PRIME)
    })
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3],
            self.0[4], self.0[5],
            self.0[6], self.0[7],
            self.0[8], self.0[9],
            self.0[10], self.0[11], self.0[12], self.0[13], self.0[14], self.0[15],
        )
    }
}

#[cfg(test)]
mod test {
    use super::Uuid;

    #[test]
    fn offline_uuid_sets_version_and_variant() {
        let uuid = Uuid::offline_player("Notch");
        assert_eq!(uuid.0[6] & 0xF0, 0x30);
        assert_eq!(uuid.0[8] & 0xC0, 0x80);
    }

    #[test]
    fn offline_uuid_is_deterministic() {
        assert_eq!(Uuid::offline_player("Alex"), Uuid::offline_player("Alex"));
        assert_ne!(Uuid::offline_player("Alex"), Uuid::offline_player("Steve"));
    }
}
