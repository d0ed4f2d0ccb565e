//! Per-run session record and the store that owns it.
//!
//! A session holds every artifact produced during one workflow run plus the
//! control slots the router consults (`fix_count`, `panic`,
//! `trigger_test_after_fix`). Only the router mutates a session; the pipeline
//! controller reads snapshots.

pub mod store;

pub use store::SessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `(app, user, session)` triple identifying one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app: String,
    pub user: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(
        app: impl Into<String>,
        user: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            user: user.into(),
            session: session.into(),
        }
    }

    /// Key with a fresh random session id.
    pub fn generate(app: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(app, user, Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app, self.user, self.session)
    }
}

/// Named text slots of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Prd,
    Code,
    Test,
}

impl SlotName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Prd => "prd",
            SlotName::Code => "code",
            SlotName::Test => "test",
        }
    }
}

impl std::fmt::Display for SlotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of reading a slot: "never produced" is distinct from "produced but empty".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotValue {
    #[default]
    Absent,
    Present(String),
}

impl SlotValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, SlotValue::Absent)
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            SlotValue::Absent => None,
            SlotValue::Present(text) => Some(text.as_str()),
        }
    }

    /// The slot text, or the empty string when absent.
    pub fn or_empty(&self) -> &str {
        self.as_deref().unwrap_or("")
    }
}

impl From<Option<String>> for SlotValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => SlotValue::Present(text),
            None => SlotValue::Absent,
        }
    }
}

/// Mutable state of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub created_at: DateTime<Utc>,
    prd: Option<String>,
    code: Option<String>,
    test: Option<String>,
    /// Number of Fix invocations so far; never decremented.
    pub fix_count: u32,
    /// Operator/controller abort request, observed by the Fix before-hook.
    pub panic: bool,
    /// Set after a Fix result is stored, cleared by the next Test before-hook.
    pub trigger_test_after_fix: bool,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            prd: None,
            code: None,
            test: None,
            fix_count: 0,
            panic: false,
            trigger_test_after_fix: false,
        }
    }

    pub fn get(&self, slot: SlotName) -> SlotValue {
        self.slot_ref(slot).clone().into()
    }

    pub fn set(&mut self, slot: SlotName, value: impl Into<String>) {
        *self.slot_mut(slot) = Some(value.into());
    }

    fn slot_ref(&self, slot: SlotName) -> &Option<String> {
        match slot {
            SlotName::Prd => &self.prd,
            SlotName::Code => &self.code,
            SlotName::Test => &self.test,
        }
    }

    fn slot_mut(&mut self, slot: SlotName) -> &mut Option<String> {
        match slot {
            SlotName::Prd => &mut self.prd,
            SlotName::Code => &mut self.code,
            SlotName::Test => &mut self.test,
        }
    }
}
