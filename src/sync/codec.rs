//! Value codecs: rebuilding typed values from the plain JSON held in the store.
//!
//! A codec is built from [`SyncOptions`] naming how to construct one item
//! (serde constructor or a custom initializer) and a collection shape:
//!
//! - [`ValueCodec::object`] applies the item function to the whole value
//! - [`ValueCodec::array`] applies it to every element of a JSON array
//! - [`ValueCodec::record`] applies it to every value of a JSON object
//!
//! ```
//! use ctxsync::sync::codec::{SyncOptions, ValueCodec};
//! use serde_json::json;
//!
//! let codec = ValueCodec::array(SyncOptions::<u32>::constructor()).unwrap();
//! assert_eq!(codec.decode(json!([1, 2, 3])).unwrap(), vec![1, 2, 3]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};

type ItemFn<T> = Arc<dyn Fn(Value) -> Result<T> + Send + Sync>;

/// Collection shape of a synchronized field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializeAs {
    /// The whole value is one item.
    #[default]
    Object,
    /// Ordered sequence of items.
    Array,
    /// String-keyed mapping of items.
    Record,
}

impl fmt::Display for InitializeAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
            Self::Record => f.write_str("record"),
        }
    }
}

/// How to build one item from JSON.
///
/// When both are configured the initializer wins.
pub struct SyncOptions<T> {
    constructor: Option<ItemFn<T>>,
    initializer: Option<ItemFn<T>>,
}

impl<T> SyncOptions<T> {
    /// Options with nothing configured. Building a codec from these fails.
    pub fn new() -> Self {
        Self {
            constructor: None,
            initializer: None,
        }
    }

    /// Build items with `f`.
    pub fn initializer(f: impl Fn(Value) -> T + Send + Sync + 'static) -> Self {
        Self::new().with_initializer(f)
    }

    /// Set the item initializer.
    pub fn with_initializer(mut self, f: impl Fn(Value) -> T + Send + Sync + 'static) -> Self {
        self.initializer = Some(Arc::new(move |json| Ok(f(json))));
        self
    }

    /// Whether any item builder is configured.
    pub fn is_configured(&self) -> bool {
        self.constructor.is_some() || self.initializer.is_some()
    }

    fn into_item_fn(self) -> Result<ItemFn<T>> {
        self.initializer.or(self.constructor).ok_or_else(|| {
            SyncError::Configuration(
                "sync options need a constructor or an initializer".to_owned(),
            )
        })
    }
}

impl<T: DeserializeOwned> SyncOptions<T> {
    /// Build items by deserializing them with serde.
    pub fn constructor() -> Self {
        Self::new().with_constructor()
    }

    /// Set the serde constructor.
    pub fn with_constructor(mut self) -> Self {
        self.constructor = Some(Arc::new(|json| {
            serde_json::from_value(json).map_err(|e| {
                SyncError::Deserialization(format!(
                    "cannot construct {}: {e}",
                    std::any::type_name::<T>()
                ))
            })
        }));
        self
    }
}

impl<T> Default for SyncOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SyncOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("constructor", &self.constructor.is_some())
            .field("initializer", &self.initializer.is_some())
            .finish()
    }
}

/// Converts between stored JSON and the live value of one field.
pub struct ValueCodec<V> {
    shape: InitializeAs,
    decode: Arc<dyn Fn(Value) -> Result<V> + Send + Sync>,
}

impl<V> Clone for ValueCodec<V> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<V> fmt::Debug for ValueCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCodec")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl<V: 'static> ValueCodec<V> {
    /// Apply the item builder to the whole JSON value.
    pub fn object(options: SyncOptions<V>) -> Result<Self> {
        let item = options.into_item_fn()?;
        Ok(Self {
            shape: InitializeAs::Object,
            decode: item,
        })
    }
}

impl<T: 'static> ValueCodec<Vec<T>> {
    /// Apply the item builder to every element of a JSON array.
    ///
    /// `null` decodes to an empty vector.
    pub fn array(options: SyncOptions<T>) -> Result<Self> {
        let item = options.into_item_fn()?;
        Ok(Self {
            shape: InitializeAs::Array,
            decode: Arc::new(move |json| match json {
                Value::Array(items) => items.into_iter().map(|v| item(v)).collect(),
                Value::Null => Ok(Vec::new()),
                other => Err(SyncError::Deserialization(format!(
                    "expected array, found {}",
                    json_kind(&other)
                ))),
            }),
        })
    }
}

impl<T: 'static> ValueCodec<HashMap<String, T>> {
    /// Apply the item builder to every value of a JSON object, keeping keys.
    ///
    /// `null` decodes to an empty map.
    pub fn record(options: SyncOptions<T>) -> Result<Self> {
        let item = options.into_item_fn()?;
        Ok(Self {
            shape: InitializeAs::Record,
            decode: Arc::new(move |json| match json {
                Value::Object(entries) => entries
                    .into_iter()
                    .map(|(key, v)| item(v).map(|built| (key, built)))
                    .collect(),
                Value::Null => Ok(HashMap::new()),
                other => Err(SyncError::Deserialization(format!(
                    "expected record, found {}",
                    json_kind(&other)
                ))),
            }),
        })
    }
}

impl<V> ValueCodec<V> {
    /// Collection shape this codec expects.
    pub fn shape(&self) -> InitializeAs {
        self.shape
    }

    /// Rebuild a live value from stored JSON.
    pub fn decode(&self, json: Value) -> Result<V> {
        (self.decode)(json)
    }
}

impl<V: Serialize> ValueCodec<V> {
    /// Turn a live value into plain JSON for the store.
    pub fn encode(&self, value: &V) -> Result<Value> {
        serde_json::to_value(value).map_err(|e| SyncError::Serialization(e.to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
