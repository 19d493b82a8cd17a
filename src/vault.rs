// 9.2 vault.rs: custody balances held by the provider.
// balance = everything the provider holds. reserved = collateral backing live positions.
// free = balance - reserved, and reserved <= balance always.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("insufficient vault balance for {asset}: available {available}, requested {requested}")]
    InsufficientBalance {
        asset: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("release of {requested} exceeds reserved {reserved} for {asset}")]
    ReleaseExceedsReserved {
        asset: Address,
        reserved: Amount,
        requested: Amount,
    },

    #[error("vault arithmetic overflow for {0}")]
    Overflow(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub balance: Amount,
    pub reserved: Amount,
}

impl AssetBalance {
    pub fn free(&self) -> Amount {
        // reserved <= balance is the vault invariant
        self.balance.checked_sub(self.reserved).unwrap_or_else(Amount::zero)
    }
}

impl Default for AssetBalance {
    fn default() -> Self {
        Self {
            balance: Amount::zero(),
            reserved: Amount::zero(),
        }
    }
}

// Custody for every asset the provider holds. Only the registry mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vault {
    assets: HashMap<Address, AssetBalance>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset(&self, asset: Address) -> AssetBalance {
        self.assets.get(&asset).copied().unwrap_or_default()
    }

    pub fn balance(&self, asset: Address) -> Amount {
        self.asset(asset).balance
    }

    pub fn reserved(&self, asset: Address) -> Amount {
        self.asset(asset).reserved
    }

    pub fn free(&self, asset: Address) -> Amount {
        self.asset(asset).free()
    }

    pub fn assets(&self) -> impl Iterator<Item = (&Address, &AssetBalance)> {
        self.assets.iter()
    }

    // unsolicited inflow. lands as free liquidity.
    pub fn credit(&mut self, asset: Address, amount: Amount) -> Result<Amount, VaultError> {
        let entry = self.assets.entry(asset).or_default();
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or(VaultError::Overflow(asset))?;
        Ok(entry.balance)
    }

    // Check whether `amount` could be reserved without mutating anything.
    pub fn can_reserve(&self, asset: Address, amount: Amount) -> Result<(), VaultError> {
        let current = self.asset(asset);
        let free = current.free();
        if amount > free {
            return Err(VaultError::InsufficientBalance {
                asset,
                available: free,
                requested: amount,
            });
        }
        current
            .reserved
            .checked_add(amount)
            .ok_or(VaultError::Overflow(asset))?;
        Ok(())
    }

    pub fn reserve(&mut self, asset: Address, amount: Amount) -> Result<(), VaultError> {
        self.can_reserve(asset, amount)?;
        let entry = self.assets.entry(asset).or_default();
        entry.reserved = entry
            .reserved
            .checked_add(amount)
            .ok_or(VaultError::Overflow(asset))?;
        Ok(())
    }

    // give a reservation back to free liquidity (cancelled position)
    pub fn release(&mut self, asset: Address, amount: Amount) -> Result<(), VaultError> {
        let current = self.asset(asset);
        let reserved = current
            .reserved
            .checked_sub(amount)
            .ok_or(VaultError::ReleaseExceedsReserved {
                asset,
                reserved: current.reserved,
                requested: amount,
            })?;
        self.assets.insert(
            asset,
            AssetBalance {
                balance: current.balance,
                reserved,
            },
        );
        Ok(())
    }

    // Pay out a whole reservation: drops both reserved and balance by `amount`.
    pub fn settle_reserved(&mut self, asset: Address, amount: Amount) -> Result<(), VaultError> {
        let current = self.asset(asset);
        let reserved = current
            .reserved
            .checked_sub(amount)
            .ok_or(VaultError::ReleaseExceedsReserved {
                asset,
                reserved: current.reserved,
                requested: amount,
            })?;
        let balance = current
            .balance
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientBalance {
                asset,
                available: current.balance,
                requested: amount,
            })?;
        self.assets.insert(asset, AssetBalance { balance, reserved });
        Ok(())
    }

    // withdraw unreserved liquidity only
    pub fn debit_free(&mut self, asset: Address, amount: Amount) -> Result<Amount, VaultError> {
        let current = self.asset(asset);
        let free = current.free();
        if amount > free {
            return Err(VaultError::InsufficientBalance {
                asset,
                available: free,
                requested: amount,
            });
        }
        let balance = current
            .balance
            .checked_sub(amount)
            .ok_or(VaultError::Overflow(asset))?;
        self.assets.insert(
            asset,
            AssetBalance {
                balance,
                reserved: current.reserved,
            },
        );
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dai() -> Address {
        Address::from_low_u64(0xda1)
    }

    #[test]
    fn credit_is_free_liquidity() {
        let mut vault = Vault::new();
        vault.credit(dai(), Amount::units(1000)).unwrap();

        assert_eq!(vault.balance(dai()), Amount::units(1000));
        assert_eq!(vault.reserved(dai()), Amount::zero());
        assert_eq!(vault.free(dai()), Amount::units(1000));
    }

    #[test]
    fn reserve_respects_free_balance() {
        let mut vault = Vault::new();
        vault.credit(dai(), Amount::units(1000)).unwrap();

        vault.reserve(dai(), Amount::units(600)).unwrap();
        assert_eq!(vault.free(dai()), Amount::units(400));

        let result = vault.reserve(dai(), Amount::units(500));
        assert!(matches!(result, Err(VaultError::InsufficientBalance { .. })));
        // failed reservation leaves state untouched
        assert_eq!(vault.reserved(dai()), Amount::units(600));
    }

    #[test]
    fn unknown_asset_has_nothing() {
        let vault = Vault::new();
        assert!(vault.can_reserve(dai(), Amount::units(1)).is_err());
        assert!(vault.can_reserve(dai(), Amount::zero()).is_ok());
    }

    #[test]
    fn release_returns_to_free() {
        let mut vault = Vault::new();
        vault.credit(dai(), Amount::units(1000)).unwrap();
        vault.reserve(dai(), Amount::units(1000)).unwrap();
        assert_eq!(vault.free(dai()), Amount::zero());

        vault.release(dai(), Amount::units(1000)).unwrap();
        assert_eq!(vault.free(dai()), Amount::units(1000));
        assert!(matches!(
            vault.release(dai(), Amount::units(1)),
            Err(VaultError::ReleaseExceedsReserved { .. })
        ));
    }

    #[test]
    fn settle_reserved_debits_balance() {
        let mut vault = Vault::new();
        vault.credit(dai(), Amount::units(1500)).unwrap();
        vault.reserve(dai(), Amount::units(1000)).unwrap();

        vault.settle_reserved(dai(), Amount::units(1000)).unwrap();
        assert_eq!(vault.balance(dai()), Amount::units(500));
        assert_eq!(vault.reserved(dai()), Amount::zero());
    }

    #[test]
    fn debit_free_cannot_touch_reservations() {
        let mut vault = Vault::new();
        vault.credit(dai(), Amount::units(1000)).unwrap();
        vault.reserve(dai(), Amount::units(800)).unwrap();

        assert!(vault.debit_free(dai(), Amount::units(300)).is_err());
        assert_eq!(vault.debit_free(dai(), Amount::units(200)), Ok(Amount::units(800)));
        assert_eq!(vault.free(dai()), Amount::zero());
    }
}
