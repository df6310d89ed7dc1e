use anyhow::{Result, bail};
use pallas_traverse::{Era as PallasEra, MultiEraBlock};
use tracing::debug;
use watchtower_common::{BlockHash, BlockHeader, Era, Tx};

use crate::tx::map_transaction;

/// A raw block mapped into header and transactions
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub header: BlockHeader,
    pub txs: Vec<Tx>,
}

pub fn map_era(era: PallasEra) -> Result<Era> {
    Ok(match era {
        PallasEra::Byron => Era::Byron,
        PallasEra::Shelley => Era::Shelley,
        PallasEra::Allegra => Era::Allegra,
        PallasEra::Mary => Era::Mary,
        PallasEra::Alonzo => Era::Alonzo,
        PallasEra::Babbage => Era::Babbage,
        PallasEra::Conway => Era::Conway,
        x => bail!("Impossible era: {x:?}"),
    })
}

/// Header of a raw block without mapping its transactions
pub fn decode_header(raw_block: &[u8]) -> Result<BlockHeader> {
    let block = MultiEraBlock::decode(raw_block)?;
    header_of(&block)
}

fn header_of(block: &MultiEraBlock) -> Result<BlockHeader> {
    let slot = block.slot();
    let number = block.number();
    let era = match map_era(block.era()) {
        Ok(era) => era,
        Err(e) => bail!("Block slot {slot}, number {number}: {e}"),
    };
    Ok(BlockHeader::new(
        slot,
        BlockHash::new(*block.hash()),
        number,
        era.id(),
    ))
}

/// Decode a raw block into its header and transactions
pub fn decode_block(raw_block: &[u8]) -> Result<DecodedBlock> {
    let block = MultiEraBlock::decode(raw_block)?;
    let header = header_of(&block)?;

    let txs: Vec<Tx> = block
        .txs()
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            map_transaction(tx, header.slot, header.hash, index as u32, header.era_id)
        })
        .collect();

    debug!(
        slot = header.slot,
        number = header.number,
        txs = txs.len(),
        "Decoded block"
    );

    Ok(DecodedBlock { header, txs })
}
