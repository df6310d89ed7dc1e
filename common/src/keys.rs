//! Storage key encodings
//!
//! All integers are big-endian so that the byte order of keys matches the
//! numeric order of slots and indices.

/// Length of a UTXO key: tx hash followed by output index
pub const TX_INPUT_KEY_LEN: usize = 32 + 4;

/// Length of a tx key: block slot followed by position in block
pub const TX_KEY_LEN: usize = 8 + 4;

/// Length of a confirmed block key: block slot
pub const BLOCK_KEY_LEN: usize = 8;

/// Key of the single latest point record
pub const LATEST_POINT_KEY: &[u8] = b"default";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid {kind} key length: expected {expected}, got {got}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
}

pub(crate) fn check_len(kind: &'static str, key: &[u8], expected: usize) -> Result<(), KeyError> {
    if key.len() != expected {
        return Err(KeyError::InvalidLength {
            kind,
            expected,
            got: key.len(),
        });
    }
    Ok(())
}

/// Encode a slot as an 8 byte key
pub fn slot_key(slot: u64) -> [u8; BLOCK_KEY_LEN] {
    slot.to_be_bytes()
}

/// Decode an 8 byte slot key
pub fn slot_from_key(key: &[u8]) -> Result<u64, KeyError> {
    check_len("slot", key, BLOCK_KEY_LEN)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(key);
    Ok(u64::from_be_bytes(bytes))
}

/// Encode (slot, index in block) as a 12 byte key
pub fn tx_key(slot: u64, index_in_block: u32) -> [u8; TX_KEY_LEN] {
    let mut key = [0u8; TX_KEY_LEN];
    key[..8].copy_from_slice(&slot.to_be_bytes());
    key[8..].copy_from_slice(&index_in_block.to_be_bytes());
    key
}

/// Decode a 12 byte tx key into (slot, index in block)
pub fn tx_key_parts(key: &[u8]) -> Result<(u64, u32), KeyError> {
    check_len("tx", key, TX_KEY_LEN)?;
    let mut slot = [0u8; 8];
    slot.copy_from_slice(&key[..8]);
    let mut index = [0u8; 4];
    index.copy_from_slice(&key[8..]);
    Ok((u64::from_be_bytes(slot), u32::from_be_bytes(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0)]
    #[test_case(10)]
    #[test_case(u64::MAX)]
    fn slot_key_round_trips(slot: u64) {
        assert_eq!(slot_from_key(&slot_key(slot)).unwrap(), slot);
    }

    #[test_case(0, 0)]
    #[test_case(172_800, 3)]
    #[test_case(u64::MAX, u32::MAX)]
    fn tx_key_round_trips(slot: u64, index: u32) {
        assert_eq!(tx_key_parts(&tx_key(slot, index)).unwrap(), (slot, index));
    }

    #[test]
    fn tx_keys_order_by_slot_then_index() {
        assert!(tx_key(10, 500) < tx_key(11, 0));
        assert!(tx_key(11, 1) < tx_key(11, 2));
        assert!(tx_key(255, 0) < tx_key(256, 0));
    }

    #[test]
    fn short_keys_are_rejected() {
        assert_eq!(
            slot_from_key(&[1, 2, 3]),
            Err(KeyError::InvalidLength {
                kind: "slot",
                expected: 8,
                got: 3
            })
        );
        assert!(tx_key_parts(&[0u8; 8]).is_err());
    }
}
