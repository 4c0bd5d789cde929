use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use vigil_types::{AccountAddress, TokenAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Transfer,
    Pull,
    Mint,
    Burn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub seq: u64,
    pub kind: TransferKind,
    pub from: Option<AccountAddress>,
    pub to: Option<AccountAddress>,
    pub amount: TokenAmount,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<AccountAddress, TokenAmount>,
    allowances: HashMap<(AccountAddress, AccountAddress), TokenAmount>,
    total_supply: TokenAmount,
    journal: Vec<TransferRecord>,
}

impl LedgerState {
    fn balance(&self, account: &AccountAddress) -> TokenAmount {
        self.balances
            .get(account)
            .copied()
            .unwrap_or(TokenAmount::ZERO)
    }

    fn set_balance(&mut self, account: AccountAddress, amount: TokenAmount) {
        if amount.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, amount);
        }
    }

    fn record(
        &mut self,
        kind: TransferKind,
        from: Option<AccountAddress>,
        to: Option<AccountAddress>,
        amount: TokenAmount,
    ) {
        let seq = self.journal.len() as u64 + 1;
        self.journal.push(TransferRecord {
            seq,
            kind,
            from,
            to,
            amount,
        });
    }

    /// Debits `from` and credits each leg, or changes nothing.
    fn apply_moves(
        &mut self,
        from: AccountAddress,
        legs: &[(AccountAddress, TokenAmount)],
    ) -> Result<TokenAmount> {
        let total = legs
            .iter()
            .try_fold(TokenAmount::ZERO, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(LedgerError::Overflow(from))?;

        let available = self.balance(&from);
        let remaining = available
            .checked_sub(total)
            .ok_or(LedgerError::InsufficientBalance {
                account: from,
                available,
                needed: total,
            })?;

        // Validate every credit before touching state
        let mut staged: HashMap<AccountAddress, TokenAmount> = HashMap::new();
        staged.insert(from, remaining);
        for (to, amount) in legs {
            let current = staged.get(to).copied().unwrap_or_else(|| self.balance(to));
            let credited = current
                .checked_add(*amount)
                .ok_or(LedgerError::Overflow(*to))?;
            staged.insert(*to, credited);
        }

        for (account, balance) in staged {
            self.set_balance(account, balance);
        }
        Ok(total)
    }
}

/// In-process ledger with allowances and a transfer journal.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn total_supply(&self) -> TokenAmount {
        self.state.read().await.total_supply
    }

    pub async fn journal(&self) -> Vec<TransferRecord> {
        self.state.read().await.journal.clone()
    }

    /// Sum of everything that ever left `account`.
    pub async fn total_outflow(&self, account: AccountAddress) -> TokenAmount {
        self.state
            .read()
            .await
            .journal
            .iter()
            .filter(|r| r.from == Some(account))
            .fold(TokenAmount::ZERO, |acc, r| acc.saturating_add(r.amount))
    }

    pub async fn balances(&self) -> HashMap<AccountAddress, TokenAmount> {
        self.state.read().await.balances.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance_of(&self, account: AccountAddress) -> Result<TokenAmount> {
        Ok(self.state.read().await.balance(&account))
    }

    async fn allowance(
        &self,
        owner: AccountAddress,
        spender: AccountAddress,
    ) -> Result<TokenAmount> {
        let state = self.state.read().await;
        Ok(state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(TokenAmount::ZERO))
    }

    async fn approve(
        &self,
        owner: AccountAddress,
        spender: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if amount.is_zero() {
            state.allowances.remove(&(owner, spender));
        } else {
            state.allowances.insert((owner, spender), amount);
        }
        debug!(owner = %owner, spender = %spender, amount = %amount, "Allowance set");
        Ok(())
    }

    async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        let before = state.balance(&from);
        state.apply_moves(from, &[(to, amount)])?;
        state.record(TransferKind::Transfer, Some(from), Some(to), amount);

        info!(
            from = %from,
            to = %to,
            amount = %amount,
            balance_before = %before,
            balance_after = %state.balance(&from),
            "💸 Transfer"
        );
        Ok(())
    }

    async fn transfer_split(
        &self,
        from: AccountAddress,
        legs: &[(AccountAddress, TokenAmount)],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let total = state.apply_moves(from, legs)?;
        for (to, amount) in legs {
            if !amount.is_zero() {
                state.record(TransferKind::Transfer, Some(from), Some(*to), *amount);
            }
        }

        info!(from = %from, amount = %total, legs = legs.len(), "💸 Split transfer");
        Ok(())
    }

    async fn pull_split(
        &self,
        spender: AccountAddress,
        payer: AccountAddress,
        legs: &[(AccountAddress, TokenAmount)],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let needed = legs
            .iter()
            .try_fold(TokenAmount::ZERO, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(LedgerError::Overflow(payer))?;
        if needed.is_zero() {
            return Ok(());
        }

        let approved = state
            .allowances
            .get(&(payer, spender))
            .copied()
            .unwrap_or(TokenAmount::ZERO);
        let remaining_allowance =
            approved
                .checked_sub(needed)
                .ok_or(LedgerError::InsufficientAllowance {
                    owner: payer,
                    spender,
                    available: approved,
                    needed,
                })?;

        state.apply_moves(payer, legs)?;
        if remaining_allowance.is_zero() {
            state.allowances.remove(&(payer, spender));
        } else {
            state.allowances.insert((payer, spender), remaining_allowance);
        }
        for (to, amount) in legs {
            if !amount.is_zero() {
                state.record(TransferKind::Pull, Some(payer), Some(*to), *amount);
            }
        }

        info!(
            payer = %payer,
            spender = %spender,
            amount = %needed,
            legs = legs.len(),
            "📥 Pulled approved funds"
        );
        Ok(())
    }

    async fn mint(&self, to: AccountAddress, amount: TokenAmount) -> Result<()> {
        let mut state = self.state.write().await;
        let balance = state
            .balance(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(to))?;
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(to))?;
        state.set_balance(to, balance);
        state.total_supply = supply;
        state.record(TransferKind::Mint, None, Some(to), amount);

        info!(to = %to, amount = %amount, total_supply = %supply, "🪙 Minted");
        Ok(())
    }

    async fn burn(&self, from: AccountAddress, amount: TokenAmount) -> Result<()> {
        let mut state = self.state.write().await;
        let available = state.balance(&from);
        let balance = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account: from,
                available,
                needed: amount,
            })?;
        state.set_balance(from, balance);
        state.total_supply = state.total_supply.saturating_sub(amount);
        state.record(TransferKind::Burn, Some(from), None, amount);

        info!(from = %from, amount = %amount, "🔥 Burned");
        Ok(())
    }
}
