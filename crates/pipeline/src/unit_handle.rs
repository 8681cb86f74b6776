//! Execution unit handle
//!
//! `UnitHandle` wraps the sending half of a unit's bundle queue, so the
//! dispatcher can hand out work without owning the unit itself.

use tokio::sync::mpsc;

use crate::unit::Bundle;

/// Handle to an execution unit's bundle queue
pub struct UnitHandle {
    /// Unit index
    id: usize,

    /// Human-readable name for logging
    name: String,

    /// Bundle queue sender
    sender: mpsc::Sender<Bundle>,
}

impl UnitHandle {
    /// Create a new unit handle
    #[inline]
    pub fn new(id: usize, name: impl Into<String>, sender: mpsc::Sender<Bundle>) -> Self {
        Self {
            id,
            name: name.into(),
            sender,
        }
    }

    /// Get the unit index
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the unit name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to queue a bundle without waiting
    #[inline]
    pub fn try_send(&self, bundle: Bundle) -> Result<(), mpsc::error::TrySendError<Bundle>> {
        self.sender.try_send(bundle)
    }

    /// Queue a bundle, waiting for capacity
    ///
    /// Returns the bundle back if the unit has stopped.
    #[inline]
    pub async fn send(&self, bundle: Bundle) -> Result<(), Bundle> {
        self.sender.send(bundle).await.map_err(|e| e.0)
    }

    /// Check if the unit has stopped receiving
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Get the free capacity of the queue
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl std::fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
