//! Chain coordinates: points, headers and eras

use std::fmt;

use crate::hash::BlockHash;
use crate::keys::{slot_key, BLOCK_KEY_LEN};

/// Cardano era, numbered in protocol order
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Era {
    #[default]
    Byron,
    Shelley,
    Allegra,
    Mary,
    Alonzo,
    Babbage,
    Conway,
}

impl Era {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Era {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Ok(match id {
            0 => Era::Byron,
            1 => Era::Shelley,
            2 => Era::Allegra,
            3 => Era::Mary,
            4 => Era::Alonzo,
            5 => Era::Babbage,
            6 => Era::Conway,
            other => return Err(other),
        })
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A (slot, hash, number) coordinate on the chain
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(map)]
pub struct BlockPoint {
    #[n(0)]
    pub slot: u64,
    #[n(1)]
    pub hash: BlockHash,
    #[n(2)]
    #[serde(default)]
    pub number: u64,
}

impl BlockPoint {
    /// The point before the first block
    pub const ORIGIN: Self = Self {
        slot: 0,
        hash: BlockHash::ZERO,
        number: 0,
    };

    pub fn new(slot: u64, hash: BlockHash, number: u64) -> Self {
        Self { slot, hash, number }
    }

    /// Origin is slot 0 with an all-zero hash; the number is not considered
    pub fn is_origin(&self) -> bool {
        self.slot == 0 && self.hash.is_zero()
    }

    /// Same block, identified by slot and hash
    pub fn same_block(&self, other: &BlockPoint) -> bool {
        self.slot == other.slot && self.hash == other.hash
    }

    pub fn key(&self) -> [u8; BLOCK_KEY_LEN] {
        slot_key(self.slot)
    }
}

impl fmt::Display for BlockPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_origin() {
            f.write_str("origin")
        } else {
            write!(f, "slot {} block {} ({})", self.slot, self.number, self.hash)
        }
    }
}

/// Header of a block announced by chain sync
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub slot: u64,
    pub hash: BlockHash,
    pub number: u64,
    pub era_id: u8,
}

impl BlockHeader {
    pub fn new(slot: u64, hash: BlockHash, number: u64, era_id: u8) -> Self {
        Self {
            slot,
            hash,
            number,
            era_id,
        }
    }

    pub fn point(&self) -> BlockPoint {
        BlockPoint::new(self.slot, self.hash, self.number)
    }

    pub fn era(&self) -> Option<Era> {
        Era::try_from(self.era_id).ok()
    }
}
