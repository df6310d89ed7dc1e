use pallas_primitives::conway;
use pallas_traverse::{MultiEraOutput, MultiEraPolicyAssets, MultiEraValue};
use tracing::warn;
use watchtower_common::{DatumHash, TokenAmount, TxOutput};

use crate::address::map_address;

/// Split a Pallas value into lovelace and native tokens
pub fn map_value(pallas_value: &MultiEraValue) -> (u64, Vec<TokenAmount>) {
    let lovelace = pallas_value.coin();
    let mut tokens = Vec::new();

    for policy_group in pallas_value.assets() {
        match policy_group {
            MultiEraPolicyAssets::AlonzoCompatibleOutput(policy, kvps) => {
                tokens.extend(
                    kvps.iter()
                        .map(|(name, amt)| TokenAmount::new(policy.to_vec(), name.to_vec(), *amt)),
                );
            }
            MultiEraPolicyAssets::ConwayOutput(policy, kvps) => {
                tokens.extend(kvps.iter().map(|(name, amt)| {
                    TokenAmount::new(policy.to_vec(), name.to_vec(), u64::from(*amt))
                }));
            }
            _ => {}
        }
    }

    (lovelace, tokens)
}

/// Inline datum bytes or datum hash, whichever the output carries
pub fn map_datum(
    datum: &Option<conway::MintedDatumOption>,
) -> (Option<Vec<u8>>, Option<DatumHash>) {
    match datum {
        Some(conway::MintedDatumOption::Hash(h)) => (None, DatumHash::try_from(h.as_ref()).ok()),
        Some(conway::MintedDatumOption::Data(d)) => (Some(d.raw_cbor().to_vec()), None),
        None => (None, None),
    }
}

/// Map one output; `slot` is the slot of the producing block
pub fn map_output(slot: u64, index: usize, output: &MultiEraOutput) -> TxOutput {
    let address = match output.address() {
        Ok(pallas_address) => map_address(&pallas_address).unwrap_or_else(|e| {
            warn!(slot, index, "Output address cannot be rendered: {e}");
            String::new()
        }),
        Err(e) => {
            warn!(slot, index, "Output address cannot be decoded: {e}");
            String::new()
        }
    };

    let (amount, tokens) = map_value(&output.value());
    let (datum, datum_hash) = map_datum(&output.datum());

    TxOutput {
        slot,
        address,
        amount,
        tokens,
        datum,
        datum_hash,
        is_used: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_datum_maps_to_nothing() {
        assert_eq!(map_datum(&None), (None, None));
    }

    #[test]
    fn datum_hash_is_kept_as_hash() {
        let hash = pallas::crypto::hash::Hash::<32>::new([4u8; 32]);
        let (datum, datum_hash) = map_datum(&Some(conway::MintedDatumOption::Hash(hash)));
        assert!(datum.is_none());
        assert_eq!(datum_hash, Some(DatumHash::new([4u8; 32])));
    }
}
