//! Cosmetic shop and profile actions: themes and personas bought with coins,
//! persona selection and the daily login streak.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::UserProfile;
use crate::error::{AppError, Result};
use crate::gamification::apply_login_streak;
use crate::prompt::Persona;
use crate::state::AppState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Theme,
    Persona,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ItemKind,
    pub price: u64,
}

pub const CATALOGUE: [ShopItem; 6] = [
    ShopItem { id: "theme-default", name: "Standard (Dark)", kind: ItemKind::Theme, price: 0 },
    ShopItem { id: "theme-forest", name: "Forest", kind: ItemKind::Theme, price: 500 },
    ShopItem { id: "theme-cyber", name: "Cyberpunk", kind: ItemKind::Theme, price: 1200 },
    ShopItem { id: "theme-gold", name: "Golden Legend", kind: ItemKind::Theme, price: 5000 },
    ShopItem { id: "persona-french-grumpy", name: "Grumpy Frenchman", kind: ItemKind::Persona, price: 800 },
    ShopItem { id: "persona-robot", name: "Logic Robot", kind: ItemKind::Persona, price: 800 },
];

pub fn find_item(id: &str) -> Option<&'static ShopItem> {
    CATALOGUE.iter().find(|i| i.id == id)
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopEntry {
    #[serde(flatten)]
    pub item: ShopItem,
    pub owned: bool,
    pub active: bool,
    pub affordable: bool,
}

fn is_active(profile: &UserProfile, item: &ShopItem) -> bool {
    match item.kind {
        ItemKind::Theme => profile.active_theme == item.id,
        ItemKind::Persona => profile.active_persona == item.id,
    }
}

pub fn catalogue_for(profile: &UserProfile) -> Vec<ShopEntry> {
    CATALOGUE
        .iter()
        .map(|item| ShopEntry {
            item: *item,
            owned: item.price == 0 || profile.has_unlocked(item.id),
            active: is_active(profile, item),
            affordable: profile.coins >= item.price,
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub item: ShopItem,
    /// False when the item was already owned and only equipped.
    pub purchased: bool,
    pub profile: UserProfile,
}

/// Buy (if not owned) and equip `item`. Owned items are equipped for free.
pub fn buy_or_equip(profile: &mut UserProfile, item: &ShopItem) -> Result<bool> {
    let owned = item.price == 0 || profile.has_unlocked(item.id);
    if !owned {
        if profile.coins < item.price {
            return Err(AppError::InsufficientCoins { needed: item.price, available: profile.coins });
        }
        profile.coins -= item.price;
        profile.unlocked_items.push(item.id.to_string());
    }
    match item.kind {
        ItemKind::Theme => profile.active_theme = item.id.to_string(),
        ItemKind::Persona => profile.active_persona = item.id.to_string(),
    }
    Ok(!owned)
}

pub fn shop(state: &AppState) -> Result<Vec<ShopEntry>> {
    Ok(catalogue_for(&state.store.profile()?))
}

#[instrument(level = "info", skip(state), fields(%item_id))]
pub fn purchase(state: &AppState, item_id: &str) -> Result<PurchaseOutcome> {
    let item = find_item(item_id).ok_or_else(|| AppError::NotFound(format!("Shop item {item_id}")))?;
    let outcome = state.store.transaction(|tx| {
        let mut profile = tx.profile()?;
        let purchased = buy_or_equip(&mut profile, item)?;
        tx.save_profile(&profile)?;
        Ok(PurchaseOutcome { item: *item, purchased, profile })
    })?;
    info!(target: "ledger", item = item.id, purchased = outcome.purchased, coins = outcome.profile.coins, "Shop item equipped");
    Ok(outcome)
}

pub fn get_profile(state: &AppState) -> Result<UserProfile> {
    state.store.profile()
}

/// Register a visit now and update the streak.
#[instrument(level = "info", skip(state))]
pub fn record_login(state: &AppState) -> Result<UserProfile> {
    let profile = state.store.transaction(|tx| {
        let mut profile = tx.profile()?;
        apply_login_streak(&mut profile, Utc::now());
        tx.save_profile(&profile)?;
        Ok(profile)
    })?;
    info!(target: "ledger", streak = profile.streak, "Login recorded");
    Ok(profile)
}

/// Select the persona used for reviews; it must be known and unlocked.
#[instrument(level = "info", skip(state))]
pub fn set_persona(state: &AppState, key: &str) -> Result<UserProfile> {
    let persona = Persona::lookup(key).ok_or_else(|| AppError::InvalidInput(format!("unknown persona {key}")))?;
    state.store.transaction(|tx| {
        let mut profile = tx.profile()?;
        if persona != Persona::Tutor && !profile.has_unlocked(persona.key()) {
            return Err(AppError::InvalidInput(format!("persona {key} is not unlocked")));
        }
        profile.active_persona = persona.key().to_string();
        tx.save_profile(&profile)?;
        Ok(profile)
    })
}
