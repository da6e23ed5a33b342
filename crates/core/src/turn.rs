//! Turn, segment and role types shared by every pipeline stage.

use serde::Serialize;

use crate::helpers::is_ooc;

/// Speaker classification of a turn or segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// The generative system's character and narration voice.
    Narrator,
    /// The human participant.
    User,
    /// A tag carried over from input that maps to neither side.
    Raw(String),
}

impl Role {
    /// The committed role that answers `last`.
    ///
    /// Anything other than a preceding `Narrator` (including no speaker yet)
    /// is answered by the narrator.
    pub fn counterpart(last: Option<&Role>) -> Role {
        match last {
            Some(Role::Narrator) => Role::User,
            _ => Role::Narrator,
        }
    }

    pub fn is_committed(&self) -> bool {
        !matches!(self, Role::Raw(_))
    }
}

/// One attributed unit of dialogue text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn narrator(text: impl Into<String>) -> Self {
        Self::new(Role::Narrator, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn is_ooc(&self) -> bool {
        is_ooc(&self.text)
    }
}

/// A span cut out of a turn before role reconciliation.
///
/// `role` is the provisional role inferred from local cues; `source` is the
/// role the text carried in the input and is what corrections are counted
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub role: Role,
    pub source: Role,
    pub text: String,
}

impl Segment {
    pub fn new(role: Role, source: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            source,
            text: text.into(),
        }
    }

    /// A segment whose provisional role is the same as its input role.
    pub fn inherited(role: Role, text: impl Into<String>) -> Self {
        Self::new(role.clone(), role, text)
    }

    pub fn is_ooc(&self) -> bool {
        is_ooc(&self.text)
    }
}

impl From<Turn> for Segment {
    fn from(turn: Turn) -> Self {
        Segment::inherited(turn.role, turn.text)
    }
}

/// Field and role names used to read and write records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleVocabulary {
    pub conversation_key: String,
    pub role_key: String,
    pub text_key: String,
    pub human_role: String,
    pub narrator_role: String,
    pub system_role: String,
}

impl Default for RoleVocabulary {
    fn default() -> Self {
        Self {
            conversation_key: "conversations".to_string(),
            role_key: "from".to_string(),
            text_key: "value".to_string(),
            human_role: "human".to_string(),
            narrator_role: "gpt".to_string(),
            system_role: "system".to_string(),
        }
    }
}

impl RoleVocabulary {
    pub fn decode_role(&self, name: &str) -> Role {
        if name == self.human_role {
            Role::User
        } else if name == self.narrator_role {
            Role::Narrator
        } else {
            Role::Raw(name.to_string())
        }
    }

    pub fn encode_role<'a>(&'a self, role: &'a Role) -> &'a str {
        match role {
            Role::User => &self.human_role,
            Role::Narrator => &self.narrator_role,
            Role::Raw(name) => name,
        }
    }

    pub fn is_system(&self, role: &Role) -> bool {
        matches!(role, Role::Raw(name) if *name == self.system_role)
    }
}
