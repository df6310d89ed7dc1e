// Watchtower common library - data model shared by the indexer crates

pub mod block;
pub mod cbor;
pub mod hash;
pub mod keys;
pub mod tx;
pub mod types;

// Flattened re-exports
pub use self::block::CardanoBlock;
pub use self::hash::{BlockHash, DatumHash, Hash, TxHash};
pub use self::tx::{sort_tx_input_outputs, TokenAmount, Tx, TxInput, TxInputOutput, TxOutput};
pub use self::types::{BlockHeader, BlockPoint, Era};
