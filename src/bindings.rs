//! Button binding table
//!
//! Maps each logical button to the keyboard key that triggers it, the color
//! used when it is shown pressed, and the channel number the native button
//! library knows it by. The table is persisted as JSON:
//!
//! ```json
//! { "mappings": [ { "id": "btn1", "key": "a", "color": "red", "btn_number": 0 } ] }
//! ```

use crate::error::{BindingStoreError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Display color tag of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ButtonColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

impl ButtonColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Gray => "gray",
        }
    }
}

impl From<String> for ButtonColor {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "red" => Self::Red,
            "orange" => Self::Orange,
            "yellow" => Self::Yellow,
            "green" => Self::Green,
            "blue" => Self::Blue,
            "purple" => Self::Purple,
            _ => Self::Gray,
        }
    }
}

impl From<ButtonColor> for String {
    fn from(color: ButtonColor) -> Self {
        color.as_str().to_string()
    }
}

/// One logical button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    /// Unique button identifier
    pub id: String,
    /// Trigger key (lowercase)
    pub key: char,
    /// Color shown while pressed
    pub color: ButtonColor,
    /// Hardware channel passed to `set_key_state`
    #[serde(rename = "btn_number")]
    pub channel: u8,
}

impl KeyBinding {
    pub fn new(id: impl Into<String>, key: char, color: ButtonColor, channel: u8) -> Self {
        Self {
            id: id.into(),
            key,
            color,
            channel,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BindingDocument {
    #[serde(default)]
    mappings: Vec<KeyBinding>,
}

/// Ordered set of bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTable {
    bindings: Vec<KeyBinding>,
}

impl BindingTable {
    pub fn new(bindings: Vec<KeyBinding>) -> Self {
        Self { bindings }
    }

    /// Get a binding by button id
    pub fn get(&self, id: &str) -> Option<&KeyBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// All bindings in table order
    pub fn iter(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter()
    }

    /// Bindings triggered by `key`
    pub fn matching(&self, key: char) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter().filter(move |b| b.key == key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind button `id` to `key`.
    ///
    /// The key is trimmed and lowercased and must be exactly one alphabetic
    /// character not owned by any other button. Nothing is modified when the
    /// request is rejected.
    pub fn rebind(&mut self, id: &str, key: &str) -> Result<char> {
        let normalized = key.trim().to_lowercase();
        let mut chars = normalized.chars();
        let new_key = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => c,
            _ => {
                return Err(Error::InvalidBinding(format!(
                    "`{}` is not a single letter",
                    key.trim()
                )))
            }
        };

        if let Some(owner) = self.bindings.iter().find(|b| b.key == new_key && b.id != id) {
            return Err(Error::InvalidBinding(format!(
                "key {} is already used by {}",
                new_key, owner.id
            )));
        }

        let binding = self
            .bindings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::InvalidBinding(format!("unknown button id {}", id)))?;
        binding.key = new_key;
        Ok(new_key)
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new(vec![
            KeyBinding::new("btn1", 'a', ButtonColor::Red, 0),
            KeyBinding::new("btn2", 'b', ButtonColor::Orange, 1),
        ])
    }
}

/// JSON persistence of the binding table
#[derive(Debug, Clone)]
pub struct BindingStore {
    path: PathBuf,
}

impl BindingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BindingTable> {
        let contents = fs::read_to_string(&self.path).map_err(BindingStoreError::from)?;
        let doc: BindingDocument =
            serde_json::from_str(&contents).map_err(BindingStoreError::from)?;
        Ok(BindingTable::new(doc.mappings))
    }

    /// Load the table, falling back to the defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(&self) -> BindingTable {
        match self.load() {
            Ok(table) => table,
            Err(e) => {
                log::error!(
                    "Failed to load bindings from {}: {}",
                    self.path.display(),
                    e
                );
                BindingTable::default()
            }
        }
    }

    /// Write the table back; called after every successful rebind
    pub fn save(&self, table: &BindingTable) -> Result<()> {
        let doc = BindingDocument {
            mappings: table.bindings.clone(),
        };
        let contents = serde_json::to_string_pretty(&doc).map_err(BindingStoreError::from)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(BindingStoreError::from)?;
        }
        fs::write(&self.path, contents).map_err(BindingStoreError::from)?;
        Ok(())
    }
}
