//! Trigger evaluation and action application

use crate::crawler::PostData;
use crate::storage::{Storage, StorageResult};
use crate::triggers::rule::{Action, PostField, PostTypeScope, TriggerEvent, TriggerRule};
use std::collections::BTreeSet;

/// Changes actually made by `TriggerEngine::apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The thread went from unsaved to saved
    pub saved: bool,
    /// Number of tag associations created
    pub tags_added: usize,
}

/// Evaluates the active rule set of a board run
#[derive(Debug, Clone, Default)]
pub struct TriggerEngine {
    rules: Vec<TriggerRule>,
}

impl TriggerEngine {
    /// Creates an engine from loaded rules; inactive rules are dropped
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self {
            rules: rules.into_iter().filter(|rule| rule.active).collect(),
        }
    }

    /// Number of active rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the union of the actions of every rule matching `post`
    ///
    /// # Arguments
    ///
    /// * `thread_number` - Remote number of the thread the post belongs to
    /// * `post` - The newly observed post
    pub fn evaluate(&self, thread_number: i64, post: &PostData) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();

        for rule in &self.rules {
            if !check_post_type(rule.post_type, thread_number, post.number) {
                continue;
            }

            if !check_event(rule, field_value(post, rule.field)) {
                continue;
            }

            if rule.save_thread {
                actions.insert(Action::SaveThread);
            }
            if let Some(tag) = &rule.tag {
                actions.insert(Action::AddTag(tag.clone()));
            }
        }

        actions
    }

    /// Applies actions to a stored thread through idempotent upserts
    pub fn apply<S>(
        storage: &mut S,
        thread_id: i64,
        actions: &BTreeSet<Action>,
    ) -> StorageResult<ActionOutcome>
    where
        S: Storage + ?Sized,
    {
        let mut outcome = ActionOutcome::default();

        for action in actions {
            match action {
                Action::SaveThread => {
                    outcome.saved |= storage.mark_thread_saved(thread_id)?;
                }
                Action::AddTag(name) => {
                    let tag_id = storage.get_or_create_tag(name)?;
                    if storage.add_thread_tag(thread_id, tag_id, true)? {
                        outcome.tags_added += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }
}

/// True if a rule with `scope` looks at post `post_number` of thread `thread_number`
pub fn check_post_type(scope: PostTypeScope, thread_number: i64, post_number: i64) -> bool {
    match scope {
        PostTypeScope::Any => true,
        PostTypeScope::FirstPost => post_number == thread_number,
        PostTypeScope::Reply => post_number != thread_number,
    }
}

/// True if `value` satisfies the rule's comparison
pub fn check_event(rule: &TriggerRule, value: &str) -> bool {
    let (value, phrase) = if rule.case_sensitive {
        (value.to_string(), rule.phrase.clone())
    } else {
        (value.to_lowercase(), rule.phrase.to_lowercase())
    };

    match rule.event {
        TriggerEvent::Contains => value.contains(&phrase),
        TriggerEvent::DoesNotContain => !value.contains(&phrase),
        TriggerEvent::Is => value == phrase,
        TriggerEvent::IsNot => value != phrase,
        TriggerEvent::BeginsWith => value.starts_with(&phrase),
        TriggerEvent::EndsWith => value.ends_with(&phrase),
    }
}

fn field_value(post: &PostData, field: PostField) -> &str {
    match field {
        PostField::Name => &post.name,
        PostField::Trip => &post.trip,
        PostField::Email => &post.email,
        PostField::Subject => &post.subject,
        PostField::Comment => &post.comment,
    }
}
