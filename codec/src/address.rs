use anyhow::Result;
use pallas::ledger::addresses as pallas_addresses;

/// Render a Pallas address in its usual text form: base58 for Byron, bech32 otherwise
pub fn map_address(address: &pallas_addresses::Address) -> Result<String> {
    match address {
        pallas_addresses::Address::Byron(byron_address) => Ok(byron_address.to_base58()),
        pallas_addresses::Address::Shelley(shelley_address) => Ok(shelley_address.to_bech32()?),
        pallas_addresses::Address::Stake(stake_address) => Ok(stake_address.to_bech32()?),
    }
}
