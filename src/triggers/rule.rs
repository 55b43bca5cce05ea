//! Trigger rule definitions
//!
//! Rules are created and edited outside the archiver and loaded read-only
//! once per board run.

use std::fmt;

/// Post attribute inspected by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostField {
    Name,
    Trip,
    Email,
    Subject,
    Comment,
}

impl PostField {
    /// Converts the field to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Trip => "trip",
            Self::Email => "email",
            Self::Subject => "subject",
            Self::Comment => "comment",
        }
    }

    /// Parses a field from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "trip" => Some(Self::Trip),
            "email" => Some(Self::Email),
            "subject" => Some(Self::Subject),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// Comparison applied between the field value and the rule's phrase
///
/// The variants come in complementary pairs except for the prefix/suffix tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Contains,
    DoesNotContain,
    Is,
    IsNot,
    BeginsWith,
    EndsWith,
}

impl TriggerEvent {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::DoesNotContain => "containsno",
            Self::Is => "is",
            Self::IsNot => "isnot",
            Self::BeginsWith => "begins",
            Self::EndsWith => "ends",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "contains" => Some(Self::Contains),
            "containsno" => Some(Self::DoesNotContain),
            "is" => Some(Self::Is),
            "isnot" => Some(Self::IsNot),
            "begins" => Some(Self::BeginsWith),
            "ends" => Some(Self::EndsWith),
            _ => None,
        }
    }
}

/// Which posts of a thread a rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostTypeScope {
    /// Every post
    Any,
    /// Only the opening post (post number equals thread number)
    FirstPost,
    /// Only replies
    Reply,
}

impl PostTypeScope {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::FirstPost => "master",
            Self::Reply => "sub",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Self::Any),
            "master" => Some(Self::FirstPost),
            "sub" => Some(Self::Reply),
            _ => None,
        }
    }
}

/// A persisted trigger rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    /// Database id, 0 for rules that were never stored
    pub id: i64,
    pub field: PostField,
    pub event: TriggerEvent,
    pub phrase: String,
    pub case_sensitive: bool,
    pub post_type: PostTypeScope,
    /// Mark the thread as saved when the rule matches
    pub save_thread: bool,
    /// Tag attached to the thread when the rule matches
    pub tag: Option<String>,
    pub active: bool,
}

impl TriggerRule {
    /// Creates an active, case-sensitive rule applying to any post with no effects
    pub fn new(field: PostField, event: TriggerEvent, phrase: impl Into<String>) -> Self {
        Self {
            id: 0,
            field,
            event,
            phrase: phrase.into(),
            case_sensitive: true,
            post_type: PostTypeScope::Any,
            save_thread: false,
            tag: None,
            active: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn scoped_to(mut self, post_type: PostTypeScope) -> Self {
        self.post_type = post_type;
        self
    }

    pub fn saving_thread(mut self) -> Self {
        self.save_thread = true;
        self
    }

    pub fn tagging_with(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Effect emitted by a matching rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Set `saved` and `auto_saved` on the thread unless it is already saved
    SaveThread,
    /// Associate the named tag with the thread unless already associated
    AddTag(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaveThread => write!(f, "save thread"),
            Self::AddTag(tag) => write!(f, "add tag '{}'", tag),
        }
    }
}
