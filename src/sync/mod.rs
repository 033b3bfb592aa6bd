//! Cross-context state synchronization.
//!
//! Each synchronized field of an owning object gets a [`SyncBinding`] that
//! writes local changes through to the durable session store, announces them
//! on the message bus, and pulls the stored value when a peer announces a
//! change. Bindings are created in bulk by [`SyncRegistry`].

pub mod binding;
pub mod codec;
pub mod registry;
pub mod slot;

pub use binding::{AnyBinding, LocalOutcome, RemoteOutcome, SyncBinding, SyncStats};
pub use codec::{InitializeAs, SyncOptions, ValueCodec};
pub use registry::{FieldMetadata, SyncRegistration, SyncRegistry, SyncedField};
pub use slot::{SLOT_PREFIX, Slot};
