use pallas_primitives::Nullable;
use pallas_traverse::MultiEraTx;
use watchtower_common::{BlockHash, Tx, TxHash, TxInput, TxInputOutput};

use crate::utxo::map_output;

macro_rules! raw_aux_data {
    ($mtx:expr) => {
        match &$mtx.auxiliary_data {
            Nullable::Some(x) => Some(x.raw_cbor().to_vec()),
            _ => None,
        }
    };
}

/// Auxiliary data of a transaction as raw CBOR
pub fn map_metadata(tx: &MultiEraTx) -> Option<Vec<u8>> {
    if let Some(mtx) = tx.as_conway() {
        return raw_aux_data!(mtx);
    }
    if let Some(mtx) = tx.as_babbage() {
        return raw_aux_data!(mtx);
    }
    if let Some(mtx) = tx.as_alonzo() {
        return raw_aux_data!(mtx);
    }
    None
}

/// Inputs consumed by the transaction, left unresolved.
/// For phase-2 failures these are the collateral inputs.
pub fn map_inputs(tx: &MultiEraTx) -> Vec<TxInputOutput> {
    tx.consumes()
        .iter()
        .map(|input| {
            let oref = input.output_ref();
            TxInputOutput::unresolved(TxInput::new(
                TxHash::new(**oref.hash()),
                oref.index() as u32,
            ))
        })
        .collect()
}

/// Map a Pallas transaction found at `index_in_block` of the block at `block_slot`
pub fn map_transaction(
    tx: &MultiEraTx,
    block_slot: u64,
    block_hash: BlockHash,
    index_in_block: u32,
    era_id: u8,
) -> Tx {
    let produced = tx.produces();
    let first_output_index = produced.first().map_or(0, |(index, _)| *index as u32);
    let outputs = produced
        .iter()
        .map(|(index, output)| map_output(block_slot, *index, output))
        .collect();

    Tx {
        block_slot,
        block_hash,
        index_in_block,
        hash: TxHash::new(*tx.hash()),
        era_id,
        metadata: map_metadata(tx),
        fee: tx.fee().unwrap_or(0),
        is_valid: tx.is_valid(),
        inputs: map_inputs(tx),
        outputs,
        first_output_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallas::codec::minicbor::Encoder;
    use pallas_traverse::Era;

    const ADDRESS: [u8; 29] = {
        let mut bytes = [7u8; 29];
        bytes[0] = 0x61;
        bytes
    };

    /// Conway tx with one body output, one collateral input and a collateral return
    fn conway_output(e: &mut Encoder<Vec<u8>>, lovelace: u64) {
        e.map(2).unwrap();
        e.u8(0).unwrap().bytes(&ADDRESS).unwrap();
        e.u8(1).unwrap().u64(lovelace).unwrap();
    }

    /// Conway tx with one body output, one collateral input and a collateral return
    fn conway_tx(is_valid: bool) -> Vec<u8> {
        let mut e = Encoder::new(Vec::new());
        e.array(4).unwrap();
        e.map(5).unwrap();
        e.u8(0).unwrap().array(1).unwrap();
        e.array(2).unwrap().bytes(&[1u8; 32]).unwrap().u32(0).unwrap();
        e.u8(1).unwrap().array(1).unwrap();
        conway_output(&mut e, 2_000_000);
        e.u8(2).unwrap().u64(200_000).unwrap();
        e.u8(13).unwrap().array(1).unwrap();
        e.array(2).unwrap().bytes(&[2u8; 32]).unwrap().u32(1).unwrap();
        e.u8(16).unwrap();
        conway_output(&mut e, 4_000_000);
        e.map(0).unwrap();
        e.bool(is_valid).unwrap();
        e.null().unwrap();
        e.into_writer()
    }

    fn mapped(is_valid: bool) -> Tx {
        let raw = conway_tx(is_valid);
        let tx = MultiEraTx::decode_for_era(Era::Conway, &raw).unwrap();
        map_transaction(&tx, 9, BlockHash::new([9; 32]), 0, 6)
    }

    #[test]
    fn valid_tx_produces_body_outputs() {
        let tx = mapped(true);
        assert!(tx.is_valid);
        assert_eq!(tx.first_output_index, 0);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].amount, 2_000_000);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].input.hash, TxHash::new([1; 32]));
    }

    #[test]
    fn failed_tx_produces_only_collateral_return() {
        let tx = mapped(false);
        assert!(!tx.is_valid);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].amount, 4_000_000);
        let produced: Vec<TxInput> = tx.produced().map(|(input, _)| input).collect();
        assert_eq!(produced, vec![TxInput::new(tx.hash, 1)]);
        assert_eq!(tx.inputs[0].input, TxInput::new(TxHash::new([2; 32]), 1));
    }
}
