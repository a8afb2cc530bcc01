// ── Dashboard configuration ──
//
// The `config` member of the `ehmi.get_config` reply. Read once when the
// dashboard is built and never touched again.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::model::oid::Oid;

/// Field width used when `input_width` is missing or zero.
pub const DEFAULT_INPUT_WIDTH: u16 = 4;

/// Declared control kind. Ignored for `lmacro:` OIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    Toggle,
    Value,
    Run,
}

/// One dashboard entry as configured on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default)]
    pub oid: Option<Oid>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<ButtonKind>,
    /// Secondary OID that gates the control while its item is busy.
    #[serde(default)]
    pub busy: Option<Oid>,
    #[serde(default)]
    pub input_width: Option<u16>,
}

impl ButtonConfig {
    /// The primary OID; an empty string counts as missing.
    pub fn oid(&self) -> Option<&Oid> {
        self.oid.as_ref().filter(|oid| !oid.as_str().is_empty())
    }

    /// The busy OID; an empty string counts as missing.
    pub fn busy(&self) -> Option<&Oid> {
        self.busy.as_ref().filter(|oid| !oid.as_str().is_empty())
    }

    pub fn input_width(&self) -> u16 {
        match self.input_width {
            Some(0) | None => DEFAULT_INPUT_WIDTH,
            Some(width) => width,
        }
    }
}

/// `button` holds either a single entry or an ordered list of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buttons {
    One(ButtonConfig),
    Many(Vec<ButtonConfig>),
}

/// The whole dashboard definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardConfig {
    pub button: Option<Buttons>,
}

impl DashboardConfig {
    /// Parse the raw `config` value from `ehmi.get_config`.
    ///
    /// A missing or null `button` gives an empty dashboard. Entry errors
    /// name the offending entry's position.
    pub fn from_json(config: &Value) -> Result<Self, CoreError> {
        let button = match config {
            Value::Object(map) => map.get("button"),
            Value::Null => None,
            other => {
                return Err(CoreError::InvalidDashboard {
                    message: format!("expected an object, got {other}"),
                });
            }
        };

        let button = match button {
            None | Some(Value::Null) => None,
            Some(Value::Array(entries)) => Some(Buttons::Many(
                entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| parse_entry(index, entry))
                    .collect::<Result<_, _>>()?,
            )),
            Some(entry) => Some(Buttons::One(parse_entry(0, entry)?)),
        };

        Ok(Self { button })
    }

    /// Entries in on-screen order.
    pub fn buttons(&self) -> &[ButtonConfig] {
        match &self.button {
            None => &[],
            Some(Buttons::One(entry)) => std::slice::from_ref(entry),
            Some(Buttons::Many(entries)) => entries,
        }
    }
}

fn parse_entry(index: usize, entry: &Value) -> Result<ButtonConfig, CoreError> {
    ButtonConfig::deserialize(entry).map_err(|e| CoreError::InvalidDashboard {
        message: format!("button #{index}: {e}"),
    })
}
