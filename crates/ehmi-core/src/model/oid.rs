// ── Item identity ──
//
// OIDs are `class:group/id` strings. The class prefix drives both the
// control kind (lmacro → run button) and the busy rule a control applies.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── OidKind ─────────────────────────────────────────────────────────

/// Item class, taken from the OID prefix before the first `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OidKind {
    Unit,
    Sensor,
    Lvar,
    Lmacro,
    /// Any other class (`lcycle`, `dmatrix_rule`, ...) or no prefix at all.
    #[strum(disabled)]
    Other,
}

// ── Oid ─────────────────────────────────────────────────────────────

/// An EVA ICS item identifier, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(String);

impl Oid {
    pub fn new(oid: impl Into<String>) -> Self {
        Self(oid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The item class. Matching is case-sensitive, like the server's.
    pub fn kind(&self) -> OidKind {
        self.0
            .split_once(':')
            .and_then(|(class, _)| OidKind::from_str(class).ok())
            .unwrap_or(OidKind::Other)
    }

    /// `lmacro:` items are invoked with `run` rather than unit actions.
    pub fn is_macro(&self) -> bool {
        self.kind() == OidKind::Lmacro
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Oid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for Oid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Oid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
