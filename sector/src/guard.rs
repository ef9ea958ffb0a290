//! Authorization and rate limiting
//!
//! Both guards run before any state mutation. Authorization binds an actor
//! to the ship it claims to act through; the rate limiter tracks a fixed
//! window per `(character, method)` pair.

use starhold_common::constants::{MICROS_PER_SEC, RATE_LIMIT_MAX_CALLS, RATE_LIMIT_WINDOW_SECS};
use starhold_common::errors::GameError;

use crate::state::{CharacterData, RateWindowData, ShardState, ShipData};

/// The actor must currently pilot the ship, unless explicitly overridden
pub fn authorize(
    character: &CharacterData,
    ship: &ShipData,
    admin_override: bool,
) -> Result<(), GameError> {
    if admin_override {
        return Ok(());
    }
    let piloting = character.current_ship == Some(ship.id);
    let owns = ship.owner_character.as_deref() == Some(character.id.as_str());
    if piloting && owns {
        Ok(())
    } else {
        Err(GameError::ActorAuthorization {
            actor: character.id.clone(),
            ship: ship.id,
        })
    }
}

/// Advance a window to `now`, returning the updated window and whether the
/// call is allowed
pub fn advance_window(window: Option<RateWindowData>, now_micros: u64) -> (RateWindowData, bool) {
    let window_len = RATE_LIMIT_WINDOW_SECS * MICROS_PER_SEC;
    let mut window = window.unwrap_or_default();
    if now_micros.saturating_sub(window.window_start_micros) >= window_len {
        window.window_start_micros = now_micros;
        window.calls = 0;
    }
    if window.calls >= RATE_LIMIT_MAX_CALLS {
        return (window, false);
    }
    window.calls += 1;
    (window, true)
}

/// Count one call against the character's window for this method
pub async fn check_rate(
    state: &mut ShardState,
    character: &str,
    method: &str,
    now_micros: u64,
) -> Result<(), GameError> {
    let key = format!("{}:{}", character, method);
    let current = state
        .rate_windows
        .get(&key)
        .await
        .map_err(|_| GameError::TransientStorage(format!("rate window {}", key)))?;
    let (updated, allowed) = advance_window(current, now_micros);
    state
        .rate_windows
        .insert(&key, updated)
        .map_err(|_| GameError::TransientStorage(format!("rate window {}", key)))?;
    if allowed {
        Ok(())
    } else {
        Err(GameError::RateLimit {
            method: method.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhold_common::types::PlayerKind;

    fn character(id: &str, ship: Option<u64>) -> CharacterData {
        CharacterData {
            id: id.to_string(),
            name: id.to_string(),
            corporation: None,
            current_ship: ship,
            player_type: PlayerKind::Human,
            registered_micros: 0,
        }
    }

    fn ship(id: u64, owner: &str) -> ShipData {
        ShipData {
            id,
            name: "test".into(),
            ship_type: "shuttle".into(),
            sector: 1,
            owner_character: Some(owner.to_string()),
            ..ShipData::default()
        }
    }

    #[test]
    fn pilots_control_their_own_ship() {
        let kara = character("kara", Some(3));
        assert!(authorize(&kara, &ship(3, "kara"), false).is_ok());
        assert!(authorize(&kara, &ship(3, "vex"), false).is_err());
        assert!(authorize(&kara, &ship(4, "kara"), false).is_err());
        assert!(authorize(&kara, &ship(4, "vex"), true).is_ok());
    }

    #[test]
    fn windows_fill_and_reset() {
        let mut window = None;
        for _ in 0..RATE_LIMIT_MAX_CALLS {
            let (next, allowed) = advance_window(window.take(), 1_000);
            assert!(allowed);
            window = Some(next);
        }
        let (next, allowed) = advance_window(window.take(), 1_000);
        assert!(!allowed, "window is exhausted");

        // A fresh window opens once enough time passes
        let later = 1_000 + RATE_LIMIT_WINDOW_SECS * MICROS_PER_SEC;
        let (_, allowed) = advance_window(Some(next), later);
        assert!(allowed);
    }
}
