//! Run economy: challenge coins, seeded price drift, shop offers and
//! permanent upgrades.
//!
//! Price drift and shop stock are derived from the player's `game_seed`, so
//! two runs with the same seed see the same prices wave for wave.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use wavefall_common::{CoreError, ItemId, UpgradeId};

use crate::catalog::{GameCatalog, ItemKind};
use crate::player::Player;

/// Economy error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    /// Insufficient gold
    #[error("Insufficient gold: need {needed}, have {have}")]
    InsufficientFunds {
        /// Amount needed
        needed: u64,
        /// Amount available
        have: u64,
    },
    /// Insufficient challenge coins
    #[error("Insufficient challenge coins: need {needed}, have {have}")]
    InsufficientCoins {
        /// Amount needed
        needed: u64,
        /// Amount available
        have: u64,
    },
    /// Upgrade not in the catalog
    #[error("Upgrade not found: {0}")]
    UpgradeNotFound(UpgradeId),
    /// Upgrade already at max level
    #[error("Upgrade {id} is already at max level {max_level}")]
    UpgradeMaxed {
        /// Upgrade id
        id: UpgradeId,
        /// Its maximum level
        max_level: u32,
    },
}

impl From<EconomyError> for CoreError {
    fn from(err: EconomyError) -> Self {
        match err {
            EconomyError::InsufficientFunds { .. } | EconomyError::InsufficientCoins { .. } => {
                Self::InsufficientResource(err.to_string())
            },
            EconomyError::UpgradeNotFound(_) => Self::ContentDataMissing(err.to_string()),
            EconomyError::UpgradeMaxed { .. } => Self::InvalidAction(err.to_string()),
        }
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

// ============================================================================
// Seeds
// ============================================================================

/// Modulus for derived seeds.
pub const SEED_MODULUS: u64 = 1_000_000_007;
/// Per-wave multiplier for the price-drift seed.
pub const PRICE_DRIFT_STRIDE: u64 = 9973;
/// Per-wave multiplier for the shop-offer seed.
pub const SHOP_OFFER_STRIDE: u64 = 7919;
/// Smallest per-wave price drift.
pub const MIN_PRICE_DRIFT: f64 = 0.01;
/// Largest per-wave price drift.
pub const MAX_PRICE_DRIFT: f64 = 0.15;
/// Items offered per shop visit.
pub const SHOP_OFFER_COUNT: usize = 4;

/// `(game_seed + wave * stride) mod 1_000_000_007`, without overflow.
#[must_use]
pub fn derived_seed(game_seed: u64, wave: u32, stride: u64) -> u64 {
    let step = (u64::from(wave) % SEED_MODULUS) * stride % SEED_MODULUS;
    (game_seed % SEED_MODULUS + step) % SEED_MODULUS
}

/// Price drift for reaching `wave`, uniform in `[0.01, 0.15]`.
#[must_use]
pub fn price_drift(game_seed: u64, wave: u32) -> f64 {
    let mut rng = fastrand::Rng::with_seed(derived_seed(game_seed, wave, PRICE_DRIFT_STRIDE));
    MIN_PRICE_DRIFT + rng.f64() * (MAX_PRICE_DRIFT - MIN_PRICE_DRIFT)
}

/// Challenge coins for reaching `wave`.
///
/// Every 10th wave pays `1 + floor(wave / 50)`, every 20th one more.
#[must_use]
pub fn challenge_coins_for_wave(wave: u32) -> u64 {
    let mut coins = 0;
    if wave % 10 == 0 {
        coins += 1 + u64::from(wave / 50);
    }
    if wave % 20 == 0 {
        coins += 1;
    }
    coins
}

/// What reaching a wave paid out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveEconomy {
    /// Challenge coins awarded.
    pub coins: u64,
    /// Price drift added.
    pub drift: f64,
}

/// Apply the economy side of reaching `wave` to the player.
pub fn apply_wave_economy(player: &mut Player, wave: u32) -> WaveEconomy {
    let coins = challenge_coins_for_wave(wave);
    let drift = price_drift(player.game_seed, wave);
    player.challenge_coins = player.challenge_coins.saturating_add(coins);
    player.cumulative_price_increase += drift;
    if coins > 0 {
        info!("Wave {wave}: awarded {coins} challenge coins");
    }
    debug!(
        "Wave {wave}: price drift {drift:.4}, cumulative {:.4}",
        player.cumulative_price_increase
    );
    WaveEconomy { coins, drift }
}

// ============================================================================
// Shop
// ============================================================================

/// Current price for a base price.
#[must_use]
pub fn offer_price(base_price: u64, cumulative_increase: f64) -> u64 {
    (base_price as f64 * (1.0 + cumulative_increase.max(0.0))).ceil() as u64
}

/// An item for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopOffer {
    /// Item sold.
    pub item_id: ItemId,
    /// Display name.
    pub name: String,
    /// Price in gold.
    pub price: u64,
}

/// Stock for the shop on `wave`: up to four distinct priced non-material
/// items, chosen from a seed derived from `game_seed`.
#[must_use]
pub fn shop_offers(catalog: &GameCatalog, game_seed: u64, wave: u32, cumulative_increase: f64) -> Vec<ShopOffer> {
    let mut candidates: Vec<_> = catalog
        .items()
        .iter()
        .filter(|i| i.kind != ItemKind::Material && i.price > 0)
        .collect();

    let mut rng = fastrand::Rng::with_seed(derived_seed(game_seed, wave, SHOP_OFFER_STRIDE));
    rng.shuffle(&mut candidates);

    candidates
        .into_iter()
        .take(SHOP_OFFER_COUNT)
        .map(|item| ShopOffer {
            item_id: item.id.clone(),
            name: item.name.clone(),
            price: offer_price(item.price, cumulative_increase),
        })
        .collect()
}

/// Buy one unit of an offer.
pub fn buy_offer(player: &mut Player, offer: &ShopOffer) -> EconomyResult<()> {
    if player.gold < offer.price {
        return Err(EconomyError::InsufficientFunds {
            needed: offer.price,
            have: player.gold,
        });
    }
    player.gold -= offer.price;
    player.inventory.add(offer.item_id.clone(), 1);
    debug!("Bought {} for {} gold", offer.item_id, offer.price);
    Ok(())
}

/// Buy one level of a permanent upgrade with challenge coins. Returns the
/// new level.
pub fn purchase_upgrade(player: &mut Player, catalog: &GameCatalog, upgrade_id: &str) -> EconomyResult<u32> {
    let upgrade = catalog
        .upgrade(upgrade_id)
        .ok_or_else(|| EconomyError::UpgradeNotFound(UpgradeId::new(upgrade_id)))?;

    let level = player.permanent_upgrades.get(upgrade_id).copied().unwrap_or(0);
    if level >= upgrade.max_level {
        return Err(EconomyError::UpgradeMaxed {
            id: upgrade.id.clone(),
            max_level: upgrade.max_level,
        });
    }
    if player.challenge_coins < upgrade.cost {
        return Err(EconomyError::InsufficientCoins {
            needed: upgrade.cost,
            have: player.challenge_coins,
        });
    }

    player.challenge_coins -= upgrade.cost;
    player.permanent_upgrades.insert(upgrade.id.clone(), level + 1);
    player.recalculate_stats(catalog);
    info!("Upgrade {} is now level {}", upgrade.id, level + 1);
    Ok(level + 1)
}
