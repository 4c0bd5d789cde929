use crate::error::{ProtocolError, Result};
use crate::events::{EventBus, ProtocolEvent};
use crate::types::{ParticipantRole, SlashRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vigil_ledger::Ledger;
use vigil_types::{AccountAddress, Timestamp, TokenAmount};

pub const INITIAL_REPUTATION: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub account: AccountAddress,
    pub role: ParticipantRole,
    pub stake: TokenAmount,
    pub description: String,
    pub completed: u64,
    pub correct: u64,
    /// 0-100, `correct * 100 / completed` once there is history
    pub reputation: u8,
    pub slashed: bool,
    pub slash_count: u32,
    pub total_slashed: TokenAmount,
    pub registered_at: Timestamp,
    /// Registration order, used for deterministic tie-breaks
    pub sequence: u64,
}

impl RosterMember {
    fn recompute_reputation(&mut self) {
        if self.completed > 0 {
            self.reputation = (self.correct.saturating_mul(100) / self.completed).min(100) as u8;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterStats {
    pub registered: usize,
    pub active: usize,
    pub slashed: usize,
    pub total_stake: TokenAmount,
    pub total_slashed: TokenAmount,
}

/// Staked participants of one role. Stakes are pulled into `vault` on
/// registration and slashes move out of it.
pub struct StakedRoster {
    role: ParticipantRole,
    min_stake: TokenAmount,
    reentry_reputation: u8,
    vault: AccountAddress,
    operator: AccountAddress,
    ledger: Arc<dyn Ledger>,
    members: Arc<RwLock<HashMap<AccountAddress, RosterMember>>>,
    events: EventBus,
}

impl StakedRoster {
    pub fn new(
        role: ParticipantRole,
        min_stake: TokenAmount,
        reentry_reputation: u8,
        vault: AccountAddress,
        operator: AccountAddress,
        ledger: Arc<dyn Ledger>,
        events: EventBus,
    ) -> Self {
        Self {
            role,
            min_stake,
            reentry_reputation,
            vault,
            operator,
            ledger,
            members: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    pub fn vault(&self) -> AccountAddress {
        self.vault
    }

    pub fn min_stake(&self) -> TokenAmount {
        self.min_stake
    }

    pub async fn register(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        description: &str,
        now: Timestamp,
    ) -> Result<RosterMember> {
        let mut members = self.members.write().await;
        if members.contains_key(&account) {
            return Err(ProtocolError::AlreadyRegistered {
                role: self.role,
                account,
            });
        }
        if stake < self.min_stake {
            return Err(ProtocolError::BelowMinimum {
                what: "stake",
                minimum: self.min_stake,
                provided: stake,
            });
        }

        self.ledger
            .transfer_from(self.operator, account, self.vault, stake)
            .await?;

        let member = RosterMember {
            account,
            role: self.role,
            stake,
            description: description.to_string(),
            completed: 0,
            correct: 0,
            reputation: INITIAL_REPUTATION,
            slashed: false,
            slash_count: 0,
            total_slashed: TokenAmount::ZERO,
            registered_at: now,
            sequence: members.len() as u64,
        };
        members.insert(account, member.clone());

        info!(
            role = %self.role,
            account = %account,
            stake = %stake,
            "🪪 Participant registered"
        );
        self.events.emit(ProtocolEvent::ParticipantRegistered {
            role: self.role,
            account,
            stake,
        });
        Ok(member)
    }

    /// Re-admit a slashed member after topping the stake back up to the
    /// minimum. Accuracy history restarts from `reentry_reputation`.
    pub async fn reregister(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
        now: Timestamp,
    ) -> Result<RosterMember> {
        let mut members = self.members.write().await;
        let member = members.get_mut(&account).ok_or(ProtocolError::NotRegistered {
            role: self.role,
            account,
        })?;
        if !member.slashed {
            return Err(ProtocolError::NotSlashed {
                role: self.role,
                account,
            });
        }
        let new_stake = member
            .stake
            .checked_add(top_up)
            .ok_or(ProtocolError::Overflow("stake"))?;
        if new_stake < self.min_stake {
            return Err(ProtocolError::BelowMinimum {
                what: "stake after top-up",
                minimum: self.min_stake,
                provided: new_stake,
            });
        }

        self.ledger
            .transfer_from(self.operator, account, self.vault, top_up)
            .await?;

        member.stake = new_stake;
        member.slashed = false;
        member.completed = 0;
        member.correct = 0;
        member.reputation = self.reentry_reputation;
        member.registered_at = now;

        info!(
            role = %self.role,
            account = %account,
            stake = %new_stake,
            reputation = member.reputation,
            "🔁 Participant re-registered"
        );
        self.events.emit(ProtocolEvent::ParticipantRegistered {
            role: self.role,
            account,
            stake: new_stake,
        });
        Ok(member.clone())
    }

    pub async fn member(&self, account: AccountAddress) -> Option<RosterMember> {
        self.members.read().await.get(&account).cloned()
    }

    /// Registered members ordered by registration.
    pub async fn members(&self) -> Vec<RosterMember> {
        let mut all: Vec<RosterMember> = self.members.read().await.values().cloned().collect();
        all.sort_by_key(|m| m.sequence);
        all
    }

    /// Registered, unslashed and fully staked.
    pub async fn ensure_active(&self, account: AccountAddress) -> Result<RosterMember> {
        let member = self.member(account).await.ok_or(ProtocolError::NotRegistered {
            role: self.role,
            account,
        })?;
        if member.slashed {
            return Err(ProtocolError::ParticipantSlashed {
                role: self.role,
                account,
            });
        }
        if member.stake < self.min_stake {
            return Err(ProtocolError::BelowMinimum {
                what: "stake",
                minimum: self.min_stake,
                provided: member.stake,
            });
        }
        Ok(member)
    }

    /// Active members with reputation at or above `min_reputation`, excluding
    /// `exclude`, in registration order.
    pub async fn eligible(
        &self,
        min_reputation: u8,
        exclude: &[AccountAddress],
    ) -> Vec<AccountAddress> {
        self.members()
            .await
            .into_iter()
            .filter(|m| {
                !m.slashed
                    && m.stake >= self.min_stake
                    && m.reputation >= min_reputation
                    && !exclude.contains(&m.account)
            })
            .map(|m| m.account)
            .collect()
    }

    pub async fn record_outcome(&self, account: AccountAddress, correct: bool) {
        let mut members = self.members.write().await;
        if let Some(member) = members.get_mut(&account) {
            member.completed += 1;
            if correct {
                member.correct += 1;
            }
            member.recompute_reputation();
        }
    }

    /// Forfeit `bps` of the member's stake to `destination` and mark them
    /// slashed. Already slashed members are left untouched and `None` is
    /// returned.
    pub async fn slash(
        &self,
        account: AccountAddress,
        bps: u32,
        destination: AccountAddress,
        reason: &str,
    ) -> Result<Option<SlashRecord>> {
        let mut members = self.members.write().await;
        let member = members.get_mut(&account).ok_or(ProtocolError::NotRegistered {
            role: self.role,
            account,
        })?;
        if member.slashed {
            warn!(
                role = %self.role,
                account = %account,
                "Already slashed, skipping"
            );
            return Ok(None);
        }

        let amount = member
            .stake
            .bps(bps)
            .ok_or(ProtocolError::Overflow("slash amount"))?
            .min(member.stake);
        if !amount.is_zero() {
            self.ledger.transfer(self.vault, destination, amount).await?;
        }

        member.stake = member.stake.saturating_sub(amount);
        member.slashed = true;
        member.slash_count += 1;
        member.total_slashed = member.total_slashed.saturating_add(amount);

        warn!(
            role = %self.role,
            account = %account,
            amount = %amount,
            remaining_stake = %member.stake,
            reason,
            "🔪 Stake slashed"
        );
        self.events.emit(ProtocolEvent::StakeSlashed {
            role: self.role,
            account,
            amount,
            reason: reason.to_string(),
        });

        Ok(Some(SlashRecord {
            role: self.role,
            account,
            amount,
            remaining_stake: member.stake,
            reason: reason.to_string(),
        }))
    }

    pub async fn get_stats(&self) -> RosterStats {
        let members = self.members.read().await;
        let mut stats = RosterStats {
            registered: members.len(),
            ..Default::default()
        };
        for member in members.values() {
            if member.slashed {
                stats.slashed += 1;
            } else {
                stats.active += 1;
            }
            stats.total_stake = stats.total_stake.saturating_add(member.stake);
            stats.total_slashed = stats.total_slashed.saturating_add(member.total_slashed);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_ledger::MemoryLedger;

    async fn roster() -> (StakedRoster, MemoryLedger) {
        let ledger = MemoryLedger::new();
        let operator = AccountAddress::from_label("operator");
        for name in ["a", "b", "c"] {
            let account = AccountAddress::from_label(name);
            ledger.mint(account, TokenAmount::from_tokens(1_000)).await.unwrap();
            ledger
                .approve(account, operator, TokenAmount::from_tokens(1_000))
                .await
                .unwrap();
        }
        let roster = StakedRoster::new(
            ParticipantRole::Verifier,
            TokenAmount::from_tokens(100),
            50,
            AccountAddress::from_label("vault"),
            operator,
            Arc::new(ledger.clone()),
            EventBus::disabled(),
        );
        (roster, ledger)
    }

    #[tokio::test]
    async fn test_register_pulls_stake() {
        let (roster, ledger) = roster().await;
        let a = AccountAddress::from_label("a");

        assert!(matches!(
            roster.register(a, TokenAmount::from_tokens(99), "", 0).await,
            Err(ProtocolError::BelowMinimum { .. })
        ));
        let member = roster
            .register(a, TokenAmount::from_tokens(100), "notary", 0)
            .await
            .unwrap();
        assert_eq!(member.reputation, 100);
        assert_eq!(
            ledger.balance_of(roster.vault()).await.unwrap(),
            TokenAmount::from_tokens(100)
        );
        assert!(matches!(
            roster.register(a, TokenAmount::from_tokens(100), "", 0).await,
            Err(ProtocolError::AlreadyRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_slash_once_and_bounded() {
        let (roster, ledger) = roster().await;
        let a = AccountAddress::from_label("a");
        let pool = AccountAddress::from_label("pool");
        roster
            .register(a, TokenAmount::from_tokens(200), "", 0)
            .await
            .unwrap();

        let record = roster.slash(a, 5_000, pool, "wrong vote").await.unwrap().unwrap();
        assert_eq!(record.amount, TokenAmount::from_tokens(100));
        assert_eq!(record.remaining_stake, TokenAmount::from_tokens(100));
        assert_eq!(
            ledger.balance_of(pool).await.unwrap(),
            TokenAmount::from_tokens(100)
        );

        assert!(roster.slash(a, 5_000, pool, "again").await.unwrap().is_none());
        assert_eq!(
            ledger.balance_of(pool).await.unwrap(),
            TokenAmount::from_tokens(100)
        );
        assert!(roster.eligible(0, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_full_slash_never_exceeds_stake() {
        let (roster, _) = roster().await;
        let a = AccountAddress::from_label("a");
        roster
            .register(a, TokenAmount::from_tokens(150), "", 0)
            .await
            .unwrap();

        let record = roster
            .slash(a, 10_000, AccountAddress::from_label("pool"), "fraud")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.amount, TokenAmount::from_tokens(150));
        assert_eq!(record.remaining_stake, TokenAmount::ZERO);
    }

    #[tokio::test]
    async fn test_reregistration_after_slash() {
        let (roster, _) = roster().await;
        let a = AccountAddress::from_label("a");
        roster
            .register(a, TokenAmount::from_tokens(100), "", 0)
            .await
            .unwrap();

        assert!(matches!(
            roster.reregister(a, TokenAmount::from_tokens(50), 1).await,
            Err(ProtocolError::NotSlashed { .. })
        ));
        roster
            .slash(a, 5_000, AccountAddress::from_label("pool"), "wrong vote")
            .await
            .unwrap();

        assert!(matches!(
            roster.reregister(a, TokenAmount::from_tokens(10), 1).await,
            Err(ProtocolError::BelowMinimum { .. })
        ));
        let member = roster
            .reregister(a, TokenAmount::from_tokens(50), 1)
            .await
            .unwrap();
        assert!(!member.slashed);
        assert_eq!(member.reputation, 50);
        assert_eq!(member.stake, TokenAmount::from_tokens(100));
        assert_eq!(roster.eligible(50, &[]).await, vec![a]);
        assert!(roster.eligible(60, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_reputation_tracks_accuracy() {
        let (roster, _) = roster().await;
        let a = AccountAddress::from_label("a");
        roster
            .register(a, TokenAmount::from_tokens(100), "", 0)
            .await
            .unwrap();

        roster.record_outcome(a, true).await;
        roster.record_outcome(a, false).await;
        roster.record_outcome(a, true).await;

        let member = roster.member(a).await.unwrap();
        assert_eq!(member.completed, 3);
        assert_eq!(member.correct, 2);
        assert_eq!(member.reputation, 66);
    }

    #[tokio::test]
    async fn test_eligibility_excludes_and_orders() {
        let (roster, _) = roster().await;
        let [a, b, c] = ["a", "b", "c"].map(AccountAddress::from_label);
        for account in [c, a, b] {
            roster
                .register(account, TokenAmount::from_tokens(100), "", 0)
                .await
                .unwrap();
        }

        assert_eq!(roster.eligible(0, &[]).await, vec![c, a, b]);
        assert_eq!(roster.eligible(0, &[a]).await, vec![c, b]);
    }
}
