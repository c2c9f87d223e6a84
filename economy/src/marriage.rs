//! Marriage workflow: proposal, acceptance, divorce, and the shared daily
//! claim.
//!
//! A proposal is only actionable by the invited user and expires on a
//! deadline. Acceptance sets `married_to` on both rows in one guarded pair
//! update that requires both sides to still be unmarried; if either
//! married someone else between the proposal and the click, the whole
//! acceptance fails and neither row changes. Divorce and the couple claim
//! use the same pair discipline, so `a.married_to == Some(b)` implies
//! `b.married_to == Some(a)` at every observation point.

use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;

pub const PROPOSAL_TIMEOUT_MS: u64 = 20_000;

pub const CLAIM_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;

/// Claiming within this window continues the streak; later resets it to 1.
pub const STREAK_GRACE_MS: u64 = 2 * CLAIM_COOLDOWN_MS;

/// Streak bonus stops growing past this many days.
const STREAK_REWARD_CAP: u32 = 15;

/// Daily couple reward, paid to each partner.
pub fn couple_reward(streak: u32) -> u64 {
    250 + 50 * streak.min(STREAK_REWARD_CAP) as u64
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub from: UserId,
    pub to: UserId,
    pub expires_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalResponse {
    Married { a: UserId, b: UserId },
    Declined { proposer: UserId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub partner: UserId,
    pub streak: u32,
    pub reward_each: u64,
}

/// Pending proposals, keyed by the invited user.
#[derive(Default)]
pub struct Proposals {
    pending: Mutex<HashMap<UserId, Proposal>>,
}

impl Proposals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a proposal. Both parties must currently be unmarried; a newer
    /// proposal to the same target replaces an older one.
    pub async fn propose<S: Store>(
        &self,
        store: &S,
        proposer: &UserId,
        proposer_name: &str,
        target: &UserId,
        target_name: &str,
        now_ms: u64,
    ) -> Result<Proposal, EconomyError> {
        if proposer == target {
            return Err(EconomyError::SelfTarget);
        }
        if target.is_vault() || proposer.is_vault() {
            return Err(EconomyError::IneligibleTarget);
        }
        let proposer_row = store.ensure(proposer, proposer_name).await?;
        let target_row = store.ensure(target, target_name).await?;
        if proposer_row.married_to.is_some() || target_row.married_to.is_some() {
            return Err(EconomyError::AlreadyMarried);
        }

        let proposal = Proposal {
            from: proposer.clone(),
            to: target.clone(),
            expires_at: now_ms + PROPOSAL_TIMEOUT_MS,
        };
        self.pending
            .lock()
            .await
            .insert(target.clone(), proposal.clone());
        Ok(proposal)
    }

    /// Accept or decline, by the invited user only.
    pub async fn respond<S: Store>(
        &self,
        store: &S,
        responder: &UserId,
        accept: bool,
        now_ms: u64,
    ) -> Result<ProposalResponse, EconomyError> {
        let proposal = {
            let mut pending = self.pending.lock().await;
            // Removing up front also drops an expired entry.
            match pending.remove(responder) {
                Some(proposal) if now_ms < proposal.expires_at => proposal,
                _ => return Err(EconomyError::NoProposal),
            }
        };

        if !accept {
            return Ok(ProposalResponse::Declined {
                proposer: proposal.from,
            });
        }

        // Both-unmarried guard at write time: a concurrent marriage on
        // either side fails the whole acceptance with no partial effect.
        let result = store
            .apply_pair_if(&proposal.from, responder, |proposer_row, target_row| {
                if proposer_row.married_to.is_some() || target_row.married_to.is_some() {
                    return Err(EconomyError::NoLongerAvailable);
                }
                for (row, partner) in [
                    (&mut *proposer_row, responder),
                    (&mut *target_row, &proposal.from),
                ] {
                    row.married_to = Some(partner.clone());
                    row.couple_streak = 0;
                    row.couple_last_claim = 0;
                    row.couple_anniv = now_ms;
                    row.couple_title = None;
                }
                Ok(())
            })
            .await;

        match result {
            Ok(_) => {
                info!(a = %proposal.from, b = %responder, "marriage accepted");
                Ok(ProposalResponse::Married {
                    a: proposal.from,
                    b: responder.clone(),
                })
            }
            Err(reason) => Err(reason),
        }
    }

    /// Drop expired proposals, returning them for notification.
    pub async fn sweep(&self, now_ms: u64) -> Vec<Proposal> {
        let mut pending = self.pending.lock().await;
        let expired: Vec<Proposal> = pending
            .values()
            .filter(|proposal| now_ms >= proposal.expires_at)
            .cloned()
            .collect();
        for proposal in &expired {
            pending.remove(&proposal.to);
        }
        expired
    }
}

/// Clear both sides of a marriage atomically. Returns the ex-partner.
pub async fn divorce<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
) -> Result<UserId, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let partner = account.married_to.ok_or(EconomyError::NotMarried)?;

    store
        .apply_pair_if(actor, &partner, |me, them| {
            if me.married_to.as_ref() != Some(&them.user_id) {
                return Err(EconomyError::NotMarried);
            }
            me.married_to = None;
            me.couple_title = None;
            them.married_to = None;
            them.couple_title = None;
            Ok(())
        })
        .await?;
    Ok(partner)
}

/// Set the shared couple title on both rows.
pub async fn set_title<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    title: &str,
) -> Result<String, EconomyError> {
    let cleaned = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let has_substance = cleaned
        .chars()
        .any(|c| !c.is_whitespace() && c != '-' && c != '\u{2013}' && c != '\u{2014}');
    if !has_substance {
        return Err(EconomyError::InvalidTitle);
    }

    let account = store.ensure(actor, display_name).await?;
    let partner = account.married_to.ok_or(EconomyError::NotMarried)?;

    let title_for_rows = cleaned.clone();
    store
        .apply_pair_if(actor, &partner, move |me, them| {
            if me.married_to.as_ref() != Some(&them.user_id) {
                return Err(EconomyError::NotMarried);
            }
            me.couple_title = Some(title_for_rows.clone());
            them.couple_title = Some(title_for_rows);
            Ok(())
        })
        .await?;
    Ok(cleaned)
}

/// The shared couple daily: one claim per 24h window for the pair, streak
/// continued within the grace window, both partners credited identically.
pub async fn claim<S: Store>(
    store: &S,
    actor: &UserId,
    display_name: &str,
    now_ms: u64,
) -> Result<ClaimOutcome, EconomyError> {
    let account = store.ensure(actor, display_name).await?;
    let partner = account.married_to.ok_or(EconomyError::NotMarried)?;

    let (_, _, outcome) = store
        .apply_pair_if(actor, &partner, |me, them| {
            if me.married_to.as_ref() != Some(&them.user_id) {
                return Err(EconomyError::NotMarried);
            }

            let last = me.couple_last_claim.max(them.couple_last_claim);
            if last != 0 && now_ms.saturating_sub(last) < CLAIM_COOLDOWN_MS {
                return Err(EconomyError::CooldownActive {
                    ready_at: last + CLAIM_COOLDOWN_MS,
                });
            }

            let within_grace = last == 0 || now_ms.saturating_sub(last) <= STREAK_GRACE_MS;
            let streak = if within_grace {
                me.couple_streak.max(them.couple_streak) + 1
            } else {
                1
            };
            let reward = couple_reward(streak);

            for row in [&mut *me, &mut *them] {
                row.couple_streak = streak;
                row.couple_last_claim = now_ms;
                row.wallet = row.wallet.saturating_add(reward);
            }
            Ok(ClaimOutcome {
                partner: them.user_id.clone(),
                streak,
                reward_each: reward,
            })
        })
        .await?;
    Ok(outcome)
}
