//! # Starhold Combat
//!
//! Pure, deterministic round resolution for sector encounters. The resolver
//! is a function from `(encounter, actions)` to a `RoundOutcome`: no I/O, no
//! wall-clock reads, every stochastic decision drawn from the per-round
//! seeded stream in a fixed visitation order. The sector application owns
//! persistence and event fan-out; this crate owns the arithmetic.

pub mod garrison;
pub mod resolver;

pub use garrison::{auto_actions, toll_satisfied};
pub use resolver::{
    apply_end_overrides, resolve_round, shield_mitigation, survivors_all_friendly,
};
