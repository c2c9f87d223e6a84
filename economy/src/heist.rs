//! The process-wide "big heist" event.
//!
//! Lifecycle: `Armed -> Active -> Expired`, re-arming after a cooldown.
//! While active, vault robbery odds and rewards are raised, and exactly one
//! user may claim the attempt (a claim-once latch). This state is
//! process-local by design: it is a fast-path event, and the money it
//! influences is still protected by the storage guards. A multi-instance
//! deployment would need to move it into the store.

use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;

/// Minimum quiet time between two events.
pub const HEIST_COOLDOWN_MS: u64 = 2 * 60 * 60 * 1000;

/// Trigger chance evaluated per qualifying chat message.
pub const HEIST_CHANCE_PER_MESSAGE: f64 = 0.015;

/// How long a triggered event stays claimable.
pub const HEIST_DURATION_MS: u64 = 5 * 60 * 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeistPhase {
    /// Waiting for a trigger.
    Armed,
    /// Window open; the claim latch may still be available.
    Active,
    /// Window elapsed; re-arms once the cooldown passes.
    Expired,
}

#[derive(Debug)]
struct HeistState {
    phase: HeistPhase,
    last_spawn: u64,
    expires_at: u64,
    claimed: bool,
}

pub struct HeistEvent {
    state: Mutex<HeistState>,
}

impl Default for HeistEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl HeistEvent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeistState {
                phase: HeistPhase::Armed,
                last_spawn: 0,
                expires_at: 0,
                claimed: false,
            }),
        }
    }

    fn advance(state: &mut HeistState, now_ms: u64) {
        if state.phase == HeistPhase::Active && now_ms >= state.expires_at {
            state.phase = HeistPhase::Expired;
            info!("heist window expired");
        }
        if state.phase == HeistPhase::Expired
            && now_ms.saturating_sub(state.last_spawn) >= HEIST_COOLDOWN_MS
        {
            state.phase = HeistPhase::Armed;
        }
    }

    pub async fn phase(&self, now_ms: u64) -> HeistPhase {
        let mut state = self.state.lock().await;
        Self::advance(&mut state, now_ms);
        state.phase
    }

    pub async fn is_active(&self, now_ms: u64) -> bool {
        self.phase(now_ms).await == HeistPhase::Active
    }

    /// Per-message trigger check. Returns whether a new event just opened.
    pub async fn maybe_trigger(&self, now_ms: u64, rng: &mut impl Rng) -> bool {
        let roll: f64 = rng.gen();
        self.maybe_trigger_rolled(now_ms, roll).await
    }

    pub(crate) async fn maybe_trigger_rolled(&self, now_ms: u64, roll: f64) -> bool {
        let mut state = self.state.lock().await;
        Self::advance(&mut state, now_ms);
        if state.phase != HeistPhase::Armed {
            return false;
        }
        if state.last_spawn != 0
            && now_ms.saturating_sub(state.last_spawn) < HEIST_COOLDOWN_MS
        {
            return false;
        }
        if roll >= HEIST_CHANCE_PER_MESSAGE {
            return false;
        }
        state.phase = HeistPhase::Active;
        state.last_spawn = now_ms;
        state.expires_at = now_ms + HEIST_DURATION_MS;
        state.claimed = false;
        info!(expires_at = state.expires_at, "heist window opened");
        true
    }

    /// Claim-once latch: the first caller during an active window wins.
    pub async fn claim(&self, now_ms: u64) -> bool {
        let mut state = self.state.lock().await;
        Self::advance(&mut state, now_ms);
        if state.phase != HeistPhase::Active || state.claimed {
            return false;
        }
        state.claimed = true;
        true
    }

    /// Cancel any active window and return to `Armed` cleanly.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.phase = HeistPhase::Armed;
        state.expires_at = 0;
        state.claimed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_and_rearm() {
        let heist = HeistEvent::new();
        assert_eq!(heist.phase(0).await, HeistPhase::Armed);

        // Roll above the chance: nothing happens.
        assert!(!heist.maybe_trigger_rolled(1_000, 0.5).await);
        // Winning roll opens the window.
        assert!(heist.maybe_trigger_rolled(1_000, 0.0).await);
        assert!(heist.is_active(1_000).await);
        assert!(heist.is_active(1_000 + HEIST_DURATION_MS - 1).await);

        // Window elapses, then stays cold until the cooldown passes.
        assert_eq!(
            heist.phase(1_000 + HEIST_DURATION_MS).await,
            HeistPhase::Expired
        );
        assert!(!heist.maybe_trigger_rolled(2_000 + HEIST_DURATION_MS, 0.0).await);
        assert!(
            heist
                .maybe_trigger_rolled(1_000 + HEIST_COOLDOWN_MS, 0.0)
                .await
        );
    }

    #[tokio::test]
    async fn claim_latch_is_single_use() {
        let heist = HeistEvent::new();
        assert!(!heist.claim(0).await, "nothing to claim while armed");
        heist.maybe_trigger_rolled(1_000, 0.0).await;
        assert!(heist.claim(1_001).await);
        assert!(!heist.claim(1_002).await, "second claim must lose");
        // A late claim after expiry also loses.
        assert!(!heist.claim(1_000 + HEIST_DURATION_MS).await);
    }

    #[tokio::test]
    async fn reset_replaces_active_window() {
        let heist = HeistEvent::new();
        heist.maybe_trigger_rolled(1_000, 0.0).await;
        heist.reset().await;
        assert_eq!(heist.phase(1_001).await, HeistPhase::Armed);
        // Re-armed but still inside the spawn cooldown.
        assert!(!heist.maybe_trigger_rolled(1_002, 0.0).await);
    }
}
