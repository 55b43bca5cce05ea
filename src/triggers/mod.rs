//! Declarative post triggers
//!
//! Triggers are pure data: a predicate over one post field plus a set of
//! effects. The engine evaluates every active rule against a newly archived
//! post and returns the deduplicated union of effects, which are then applied
//! through idempotent storage upserts.

mod engine;
mod rule;

pub use engine::{check_event, check_post_type, ActionOutcome, TriggerEngine};
pub use rule::{Action, PostField, PostTypeScope, TriggerEvent, TriggerRule};
