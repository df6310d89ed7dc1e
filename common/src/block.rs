//! Confirmed block record

use crate::hash::{BlockHash, TxHash};
use crate::keys::{slot_from_key, slot_key, KeyError, BLOCK_KEY_LEN};
use crate::types::{BlockHeader, BlockPoint};

/// A block that has been promoted out of the rollback window
#[derive(
    Debug,
    Default,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(map)]
pub struct CardanoBlock {
    #[n(0)]
    pub slot: u64,
    #[n(1)]
    pub number: u64,
    #[n(2)]
    pub hash: BlockHash,
    #[n(3)]
    pub era_id: u8,

    /// Hashes of the recorded txs, in block order
    #[n(4)]
    pub tx_hashes: Vec<TxHash>,
}

impl CardanoBlock {
    pub fn from_header(header: &BlockHeader, tx_hashes: Vec<TxHash>) -> Self {
        Self {
            slot: header.slot,
            number: header.number,
            hash: header.hash,
            era_id: header.era_id,
            tx_hashes,
        }
    }

    pub fn point(&self) -> BlockPoint {
        BlockPoint::new(self.slot, self.hash, self.number)
    }

    /// Confirmed block key: big-endian slot
    pub fn key(&self) -> [u8; BLOCK_KEY_LEN] {
        slot_key(self.slot)
    }

    pub fn slot_from_key(key: &[u8]) -> Result<u64, KeyError> {
        slot_from_key(key)
    }
}
