//! Store keys for synchronized fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Namespace of every slot key. Disjoint from the timer key prefix.
pub const SLOT_PREFIX: &str = "sync:";

/// Store key for one logical synchronized field:
/// `"sync:{owner byte length}:{owner}:{field}"`.
///
/// Every context computes the same slot for the same owner/field pair, and
/// distinct pairs never share a slot. The owner length makes the split
/// between owner and field unambiguous whatever characters the names hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(String);

impl Slot {
    /// Derive the slot for `field` on `owner`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] if either name is empty or contains
    /// whitespace.
    pub fn new(owner: &str, field: &str) -> Result<Self> {
        validate_name("owner", owner)?;
        validate_name("field", field)?;
        Ok(Self(format!("{SLOT_PREFIX}{}:{owner}:{field}", owner.len())))
    }

    /// The raw store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bus topic announcing writes to this slot.
    pub fn update_topic(&self) -> String {
        format!("{}_update", self.0)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SyncError::Configuration(format!("{kind} name must not be empty")));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(SyncError::Configuration(format!(
            "{kind} name '{name}' must not contain whitespace"
        )));
    }
    Ok(())
}
