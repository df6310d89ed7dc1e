mod address;
mod block;
mod tx;
mod utxo;

pub use address::*;
pub use block::*;
pub use tx::*;
pub use utxo::*;
