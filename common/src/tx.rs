//! Transactions, their inputs and outputs

use std::cmp::Ordering;

use crate::hash::{BlockHash, DatumHash, TxHash};
use crate::keys::{check_len, tx_key, tx_key_parts, KeyError, TX_INPUT_KEY_LEN, TX_KEY_LEN};

/// Reference to an output of a prior transaction
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(map)]
pub struct TxInput {
    /// Hash of the producing transaction
    #[n(0)]
    pub hash: TxHash,

    /// Output index within the producing transaction
    #[n(1)]
    pub index: u32,
}

impl TxInput {
    pub fn new(hash: TxHash, index: u32) -> Self {
        Self { hash, index }
    }

    /// UTXO key: 32 bytes of hash then the big-endian index
    pub fn key(&self) -> [u8; TX_INPUT_KEY_LEN] {
        let mut key = [0u8; TX_INPUT_KEY_LEN];
        key[..32].copy_from_slice(self.hash.as_ref());
        key[32..].copy_from_slice(&self.index.to_be_bytes());
        key
    }

    pub fn from_key(key: &[u8]) -> Result<Self, KeyError> {
        check_len("utxo", key, TX_INPUT_KEY_LEN)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&key[..32]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Ok(Self::new(TxHash::new(hash), u32::from_be_bytes(index)))
    }
}

impl std::fmt::Display for TxInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.hash, self.index)
    }
}

/// Native token quantity carried by an output.
///
/// Two amounts are equal when they name the same asset, whatever the quantity.
#[derive(
    Debug, Default, Clone, serde::Serialize, serde::Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(map)]
pub struct TokenAmount {
    #[cbor(n(0), with = "minicbor::bytes")]
    pub policy_id: Vec<u8>,
    #[cbor(n(1), with = "minicbor::bytes")]
    pub asset_name: Vec<u8>,
    #[n(2)]
    pub amount: u64,
}

impl TokenAmount {
    pub fn new(policy_id: impl Into<Vec<u8>>, asset_name: impl Into<Vec<u8>>, amount: u64) -> Self {
        Self {
            policy_id: policy_id.into(),
            asset_name: asset_name.into(),
            amount,
        }
    }
}

impl PartialEq for TokenAmount {
    fn eq(&self, other: &Self) -> bool {
        self.policy_id == other.policy_id && self.asset_name == other.asset_name
    }
}

impl Eq for TokenAmount {}

impl std::hash::Hash for TokenAmount {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.policy_id.hash(state);
        self.asset_name.hash(state);
    }
}

/// A transaction output as recorded in the UTXO store
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
pub struct TxOutput {
    /// Slot of the block producing the output
    #[n(0)]
    pub slot: u64,

    #[n(1)]
    pub address: String,

    /// Lovelace
    #[n(2)]
    pub amount: u64,

    #[n(3)]
    pub tokens: Vec<TokenAmount>,

    /// Inline datum, raw CBOR
    #[cbor(n(4), with = "minicbor::bytes")]
    pub datum: Option<Vec<u8>>,

    #[n(5)]
    pub datum_hash: Option<DatumHash>,

    /// Spent but retained (soft delete)
    #[n(6)]
    pub is_used: bool,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
            ..Default::default()
        }
    }

    /// Zero-valued outputs stand for "not found in the UTXO store"
    pub fn is_unknown(&self) -> bool {
        self.address.is_empty()
    }
}

/// An input together with the output it refers to
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
pub struct TxInputOutput {
    #[n(0)]
    pub input: TxInput,
    #[n(1)]
    pub output: TxOutput,
}

impl TxInputOutput {
    pub fn new(input: TxInput, output: TxOutput) -> Self {
        Self { input, output }
    }

    /// An input whose output has not been resolved yet
    pub fn unresolved(input: TxInput) -> Self {
        Self {
            input,
            output: TxOutput::default(),
        }
    }
}

/// A confirmed transaction
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
pub struct Tx {
    #[n(0)]
    pub block_slot: u64,
    #[n(1)]
    pub block_hash: BlockHash,
    #[n(2)]
    pub index_in_block: u32,
    #[n(3)]
    pub hash: TxHash,
    #[n(4)]
    pub era_id: u8,

    /// Auxiliary data, raw CBOR
    #[cbor(n(5), with = "minicbor::bytes")]
    pub metadata: Option<Vec<u8>>,

    #[n(6)]
    pub fee: u64,
    #[n(7)]
    pub is_valid: bool,

    /// Spent outputs; the output side is resolved from the UTXO store at indexing time
    #[n(8)]
    pub inputs: Vec<TxInputOutput>,

    /// Outputs the tx creates on chain. A phase-2 failure creates only its
    /// collateral return, if any.
    #[n(9)]
    pub outputs: Vec<TxOutput>,

    /// On-chain index of `outputs[0]`; the collateral return of a failed tx
    /// sits after the body outputs
    #[n(10)]
    pub first_output_index: u32,
}

impl Tx {
    /// Tx store key: block slot then position in block
    pub fn key(&self) -> [u8; TX_KEY_LEN] {
        tx_key(self.block_slot, self.index_in_block)
    }

    /// Decode a tx store key into (slot, index in block)
    pub fn key_parts(key: &[u8]) -> Result<(u64, u32), KeyError> {
        tx_key_parts(key)
    }

    /// The input that would spend output `index` of this tx
    pub fn output_ref(&self, index: u32) -> TxInput {
        TxInput::new(self.hash, index)
    }

    /// Outputs paired with the inputs that reference them
    pub fn produced(&self) -> impl Iterator<Item = (TxInput, &TxOutput)> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, output)| (self.output_ref(self.first_output_index + i as u32), output))
    }
}

fn compare_input_outputs(a: &TxInputOutput, b: &TxInputOutput) -> Ordering {
    a.output
        .slot
        .cmp(&b.output.slot)
        .then_with(|| a.input.hash.cmp(&b.input.hash))
        .then_with(|| a.input.index.cmp(&b.input.index))
}

/// Total order used for UTXO listings: producing slot, then tx hash, then output index
pub fn sort_tx_input_outputs(items: &mut [TxInputOutput]) {
    items.sort_by(compare_input_outputs);
}
