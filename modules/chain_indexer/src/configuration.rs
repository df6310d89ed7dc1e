use std::collections::HashSet;

use config::Config;
use watchtower_common::BlockPoint;

use crate::error::IndexerError;

/// Which side of a tx is matched against the addresses of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct AddressCheck(u8);

impl AddressCheck {
    pub const INPUTS: Self = Self(1);
    pub const OUTPUTS: Self = Self(2);
    pub const BOTH: Self = Self(3);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn inputs(self) -> bool {
        self.0 & Self::INPUTS.0 != 0
    }

    pub fn outputs(self) -> bool {
        self.0 & Self::OUTPUTS.0 != 0
    }
}

impl Default for AddressCheck {
    fn default() -> Self {
        Self::BOTH
    }
}

/// The `[indexer]` section
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerConfig {
    /// Resume point when nothing has been confirmed yet
    #[serde(default)]
    pub starting_point: Option<BlockPoint>,
    pub confirmation_depth: u32,
    #[serde(default)]
    pub addresses_of_interest: HashSet<String>,
    pub address_check: AddressCheck,
    pub keep_all_tx_outputs_in_db: bool,
    pub keep_all_tx_hashes_in_block: bool,
    pub soft_delete_utxo: bool,
    /// Bound of the runner's event queue
    pub queue_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            starting_point: None,
            confirmation_depth: 10,
            addresses_of_interest: HashSet::new(),
            address_check: AddressCheck::BOTH,
            keep_all_tx_outputs_in_db: false,
            keep_all_tx_hashes_in_block: false,
            soft_delete_utxo: false,
            queue_size: 64,
        }
    }
}

impl IndexerConfig {
    /// Load and validate the `[indexer]` section over the module defaults
    pub fn try_load(config: &Config) -> Result<Self, IndexerError> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        let indexer: Self = full_config.get("indexer")?;
        indexer.validate()?;
        Ok(indexer)
    }

    pub fn validate(&self) -> Result<(), IndexerError> {
        let bits = self.address_check.bits();
        if bits & AddressCheck::BOTH.bits() == 0 {
            return Err(IndexerError::Config(
                "address-check must select inputs, outputs or both".to_string(),
            ));
        }
        if bits & !AddressCheck::BOTH.bits() != 0 {
            return Err(IndexerError::Config(format!(
                "address-check has unknown bits set: {bits:#04b}"
            )));
        }
        if self.confirmation_depth == 0 {
            return Err(IndexerError::Config(
                "confirmation-depth must be at least 1".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(IndexerError::Config("queue-size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Whether the tx filter is active
    pub fn filters_addresses(&self) -> bool {
        !self.addresses_of_interest.is_empty()
    }

    pub fn is_of_interest(&self, address: &str) -> bool {
        self.addresses_of_interest.contains(address)
    }
}
