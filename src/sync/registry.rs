//! Registration of an owning object's synchronized fields.
//!
//! An owner lists its synchronized fields explicitly and hands over its
//! session store and bus; [`SyncRegistry::register`] builds one
//! [`SyncBinding`] per field and starts each of them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ctxsync::{LocalBus, MemorySessionStore, Reactive};
//! use ctxsync::sync::{SyncOptions, SyncRegistry, SyncedField};
//!
//! # async fn demo() -> ctxsync::Result<()> {
//! let folders = Reactive::new(Vec::<String>::new());
//! let registration = SyncRegistry::new("VaultState")
//!     .store(Arc::new(MemorySessionStore::new()))
//!     .bus(Arc::new(LocalBus::new()))
//!     .field(SyncedField::array("folders", &folders, SyncOptions::constructor())?)
//!     .register()?;
//! assert_eq!(registration.bindings().len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binding::{AnyBinding, SyncBinding};
use super::codec::{InitializeAs, SyncOptions, ValueCodec};
use super::slot::Slot;
use crate::bus::MessageBus;
use crate::context::ExecutionContext;
use crate::error::{Result, SyncError};
use crate::reactive::Reactive;
use crate::store::SessionStore;

/// Everything a field needs to build its binding.
struct BindingDeps {
    slot: Slot,
    store: Arc<dyn SessionStore>,
    bus: Arc<dyn MessageBus>,
    durable_sync: bool,
}

type Attach = Box<dyn FnOnce(BindingDeps) -> Result<Arc<dyn AnyBinding>> + Send>;

/// Declaration that one field of an owner is synchronized.
pub struct SyncedField {
    name: String,
    shape: InitializeAs,
    attach: Attach,
}

impl fmt::Debug for SyncedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedField")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl SyncedField {
    /// Declare `container` as the field `name`, decoded with `codec`.
    pub fn new<V>(name: impl Into<String>, container: &Reactive<V>, codec: ValueCodec<V>) -> Self
    where
        V: Clone + Serialize + Send + Sync + 'static,
    {
        let container = container.clone();
        let shape = codec.shape();
        Self {
            name: name.into(),
            shape,
            attach: Box::new(move |deps: BindingDeps| {
                let binding = SyncBinding::new(
                    &container,
                    deps.slot,
                    codec,
                    deps.store,
                    deps.bus,
                    deps.durable_sync,
                )?;
                Ok(binding as Arc<dyn AnyBinding>)
            }),
        }
    }

    /// Field whose whole value is built by `options`.
    pub fn object<V>(
        name: impl Into<String>,
        container: &Reactive<V>,
        options: SyncOptions<V>,
    ) -> Result<Self>
    where
        V: Clone + Serialize + Send + Sync + 'static,
    {
        Ok(Self::new(name, container, ValueCodec::object(options)?))
    }

    /// Field holding an ordered sequence of items built by `options`.
    pub fn array<T>(
        name: impl Into<String>,
        container: &Reactive<Vec<T>>,
        options: SyncOptions<T>,
    ) -> Result<Self>
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        Ok(Self::new(name, container, ValueCodec::array(options)?))
    }

    /// Field holding a string-keyed mapping of items built by `options`.
    pub fn record<T>(
        name: impl Into<String>,
        container: &Reactive<HashMap<String, T>>,
        options: SyncOptions<T>,
    ) -> Result<Self>
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        Ok(Self::new(name, container, ValueCodec::record(options)?))
    }

    /// Declared field name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Introspection record for one registered field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Field name as declared.
    pub name: String,
    /// Store key derived from owner and field.
    pub slot: Slot,
    /// Collection shape of the field.
    pub shape: InitializeAs,
}

/// Builder collecting an owner's synchronized fields and dependencies.
pub struct SyncRegistry {
    owner: String,
    store: Option<Arc<dyn SessionStore>>,
    bus: Option<Arc<dyn MessageBus>>,
    durable_sync: bool,
    fields: Vec<SyncedField>,
}

impl fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("owner", &self.owner)
            .field("store", &self.store.is_some())
            .field("bus", &self.bus.is_some())
            .field("durable_sync", &self.durable_sync)
            .field("fields", &self.fields)
            .finish()
    }
}

impl SyncRegistry {
    /// Start a registration for `owner`, the stable name shared by every
    /// context that constructs this kind of object.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            store: None,
            bus: None,
            durable_sync: true,
            fields: Vec::new(),
        }
    }

    /// Start a registration using the store, bus and capability flag of `context`.
    pub fn from_context(owner: impl Into<String>, context: &ExecutionContext) -> Self {
        Self::new(owner)
            .store(context.store())
            .bus(context.bus())
            .durable_sync(context.durable_sync())
    }

    /// Session store the bindings write through to.
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bus the bindings announce on.
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Whether this deployment needs durable cross-context sync.
    pub fn durable_sync(mut self, enabled: bool) -> Self {
        self.durable_sync = enabled;
        self
    }

    /// Declare one synchronized field.
    pub fn field(mut self, field: SyncedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Build and start one binding per declared field.
    ///
    /// With no declared fields this does nothing and needs no store.
    ///
    /// # Errors
    ///
    /// [`SyncError::Configuration`] if fields are declared without a store
    /// or bus, if two fields share a name, or if a binding cannot be built.
    /// Every binding is built before any is started. On error every
    /// container is left unbound.
    pub fn register(self) -> Result<SyncRegistration> {
        let Self {
            owner,
            store,
            bus,
            durable_sync,
            fields,
        } = self;

        if fields.is_empty() {
            return Ok(SyncRegistration::empty(owner));
        }
        let store = store.ok_or_else(|| {
            SyncError::Configuration(format!(
                "{owner} declares synchronized fields but has no session store dependency"
            ))
        })?;
        let bus = bus.ok_or_else(|| {
            SyncError::Configuration(format!(
                "{owner} declares synchronized fields but has no message bus dependency"
            ))
        })?;

        let mut seen = HashSet::new();
        let mut metadata = Vec::with_capacity(fields.len());
        for field in &fields {
            let slot = Slot::new(&owner, &field.name)?;
            if !seen.insert(slot.clone()) {
                return Err(SyncError::Configuration(format!(
                    "{owner} declares field '{}' more than once",
                    field.name
                )));
            }
            metadata.push(FieldMetadata {
                name: field.name.clone(),
                slot,
                shape: field.shape,
            });
        }

        let mut bindings = Vec::with_capacity(fields.len());
        for (field, meta) in fields.into_iter().zip(&metadata) {
            let binding = (field.attach)(BindingDeps {
                slot: meta.slot.clone(),
                store: Arc::clone(&store),
                bus: Arc::clone(&bus),
                durable_sync,
            })?;
            bindings.push(binding);
        }
        for binding in &bindings {
            binding.init()?;
        }

        debug!(owner = %owner, fields = bindings.len(), "sync fields registered");
        Ok(SyncRegistration {
            owner,
            metadata,
            bindings,
        })
    }
}

/// Bookkeeping an owner keeps after registration.
///
/// Holds the only strong handles to the bindings: dropping the
/// registration stops their event tasks and unbinds the containers.
#[derive(Debug)]
pub struct SyncRegistration {
    owner: String,
    metadata: Vec<FieldMetadata>,
    bindings: Vec<Arc<dyn AnyBinding>>,
}

impl SyncRegistration {
    fn empty(owner: String) -> Self {
        Self {
            owner,
            metadata: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Owner name the slots were derived from.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Field metadata, in declaration order.
    pub fn metadata(&self) -> &[FieldMetadata] {
        &self.metadata
    }

    /// Constructed bindings, in declaration order.
    pub fn bindings(&self) -> &[Arc<dyn AnyBinding>] {
        &self.bindings
    }

    /// Binding for the field named `name`.
    pub fn binding(&self, name: &str) -> Option<&Arc<dyn AnyBinding>> {
        self.metadata
            .iter()
            .position(|meta| meta.name == name)
            .and_then(|index| self.bindings.get(index))
    }

    /// Whether the owner declared no synchronized fields.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
