//! Leveling curve and message-driven XP grants.
//!
//! The per-level requirement follows a polynomial curve with late-game
//! boosts, smoothed so consecutive steps never jump outside a growth band.
//! Message XP targets an average number of messages per level and jitters
//! around that target; the per-user grant cooldown is a config value so
//! deployments can tune their own anti-spam window.

use crate::store::Store;
use pixelvault_types::{EconomyError, UserId};
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct ProgressionConfig {
    pub base_xp: u64,
    pub alpha: f64,
    pub beta: f64,
    pub boost_l100: f64,
    pub boost_l150: f64,
    pub min_growth_per_level: f64,
    pub max_growth_per_level: f64,
    pub late_soft_start: u32,
    pub late_soft_a: f64,
    pub late_soft_b: f64,
    /// Average messages needed per level.
    pub messages_per_level: u64,
    /// Fastest plausible pace as a fraction of the average.
    pub fastest_portion: f64,
    pub jitter_pct: f64,
    /// Per-user cooldown between XP grants.
    pub message_cooldown_ms: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_xp: 110,
            alpha: 1.60,
            beta: 0.007,
            boost_l100: 1.05,
            boost_l150: 1.12,
            min_growth_per_level: 1.03,
            max_growth_per_level: 1.12,
            late_soft_start: 120,
            late_soft_a: 0.25,
            late_soft_b: 0.015,
            messages_per_level: 360,
            fastest_portion: 0.20,
            jitter_pct: 0.20,
            message_cooldown_ms: 20_000,
        }
    }
}

impl ProgressionConfig {
    fn base_curve(&self, level: u32) -> u64 {
        let level = level.max(1);
        let mut mult = 1.0;
        if level >= 100 {
            mult *= self.boost_l100;
        }
        if level >= 150 {
            mult *= self.boost_l150;
        }
        if level >= self.late_soft_start {
            let t = (level - self.late_soft_start) as f64;
            mult *= 1.0 + self.late_soft_a * (1.0 - (-self.late_soft_b * t).exp());
        }
        let raw = self.base_xp as f64
            * (level as f64).powf(self.alpha)
            * (1.0 + self.beta * level as f64)
            * mult;
        (raw.floor() as u64).max(1)
    }

    /// XP required to go from `level` to `level + 1`, with step-to-step
    /// growth clamped into the configured band.
    pub fn xp_to_next(&self, level: u32) -> u64 {
        let level = level.max(1);
        let mut step = self.base_curve(1);
        for l in 2..=level {
            let raw = self.base_curve(l) as f64;
            let lo = step as f64 * self.min_growth_per_level;
            let hi = step as f64 * self.max_growth_per_level;
            step = raw.clamp(lo, hi).floor() as u64;
        }
        step.max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XpGain {
    pub xp: u64,
    pub levels_gained: u32,
    pub new_level: u32,
    pub total_xp: u64,
}

/// Message-XP grantor with a per-user in-memory cooldown.
pub struct Progression {
    config: ProgressionConfig,
    last_grant: Mutex<HashMap<UserId, u64>>,
}

impl Progression {
    pub fn new(config: ProgressionConfig) -> Self {
        Self {
            config,
            last_grant: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    /// Grant XP for a chat message. Returns `None` while the per-user
    /// cooldown is running.
    pub async fn grant_message_xp<S: Store>(
        &self,
        store: &S,
        actor: &UserId,
        display_name: &str,
        now_ms: u64,
        rng: &mut impl Rng,
    ) -> Result<Option<XpGain>, EconomyError> {
        {
            let mut last = self.last_grant.lock().await;
            match last.get(actor) {
                Some(at) if now_ms.saturating_sub(*at) < self.config.message_cooldown_ms => {
                    return Ok(None);
                }
                _ => {
                    last.insert(actor.clone(), now_ms);
                }
            }
        }

        // Triangular-ish jitter: the mean of two uniforms leans central.
        let jitter = (rng.gen::<f64>() + rng.gen::<f64>()) / 2.0;
        let lucky: f64 = rng.gen();

        store.ensure(actor, display_name).await?;
        let (_, gain) = store
            .apply_if(actor, |account| {
                let need = self.config.xp_to_next(account.level).max(1);
                let target = (need / self.config.messages_per_level).max(1);

                let amp = self.config.jitter_pct * target as f64;
                let rolled = (target as f64 - amp) + jitter * 2.0 * amp;

                let bonus = if lucky < 0.01 {
                    0.07 * target as f64
                } else if lucky < 0.05 {
                    0.03 * target as f64
                } else {
                    0.0
                };

                let floor = 5.0_f64.max(need as f64 / 1_200.0);
                let ceil = need as f64
                    / 30.0_f64.max(self.config.messages_per_level as f64 * self.config.fastest_portion);
                let mut gain = (rolled + bonus).clamp(floor, floor.max(ceil)).round() as u64;
                gain = crate::ops::scaled_profit(gain, account.xp_multiplier).max(1);

                account.xp = account.xp.saturating_add(gain);
                let mut levels_gained = 0;
                loop {
                    let need = self.config.xp_to_next(account.level);
                    if account.xp < need {
                        break;
                    }
                    account.xp -= need;
                    account.level += 1;
                    levels_gained += 1;
                }
                Ok(XpGain {
                    xp: gain,
                    levels_gained,
                    new_level: account.level,
                    total_xp: account.xp,
                })
            })
            .await?;
        Ok(Some(gain))
    }
}
