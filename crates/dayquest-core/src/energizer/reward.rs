use rand::Rng;

use super::EnergySettings;

/// Energy restored by a finished gated break: uniform in
/// `[reward_min, reward_max]`, both ends inclusive.
pub fn roll_reward<R: Rng + ?Sized>(settings: &EnergySettings, rng: &mut R) -> u32 {
    let lo = settings.reward_min.min(settings.reward_max);
    let hi = settings.reward_min.max(settings.reward_max);
    rng.gen_range(lo..=hi)
}
