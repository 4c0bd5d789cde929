use crate::error::Result;
use async_trait::async_trait;
use vigil_types::{AccountAddress, TokenAmount};

/// Fungible-asset ledger the protocol holds custody on.
///
/// Payers grant an allowance to the protocol operator first; the protocol then
/// pulls with [`Ledger::transfer_from`] or [`Ledger::pull_split`]. Payouts from
/// protocol-owned accounts use [`Ledger::transfer`]. Every call either applies
/// fully or not at all.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance_of(&self, account: AccountAddress) -> Result<TokenAmount>;

    async fn allowance(&self, owner: AccountAddress, spender: AccountAddress)
        -> Result<TokenAmount>;

    async fn approve(
        &self,
        owner: AccountAddress,
        spender: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()>;

    async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()>;

    /// Debit `from` once and credit every leg, atomically.
    async fn transfer_split(
        &self,
        from: AccountAddress,
        legs: &[(AccountAddress, TokenAmount)],
    ) -> Result<()>;

    /// Debit `payer` once against the allowance granted to `spender` and credit
    /// every leg, atomically.
    async fn pull_split(
        &self,
        spender: AccountAddress,
        payer: AccountAddress,
        legs: &[(AccountAddress, TokenAmount)],
    ) -> Result<()>;

    async fn transfer_from(
        &self,
        spender: AccountAddress,
        payer: AccountAddress,
        recipient: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.pull_split(spender, payer, &[(recipient, amount)]).await
    }

    async fn mint(&self, to: AccountAddress, amount: TokenAmount) -> Result<()>;

    async fn burn(&self, from: AccountAddress, amount: TokenAmount) -> Result<()>;
}
