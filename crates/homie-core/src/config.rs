//! Configure-then-freeze holder for entity configuration
//!
//! A topology entity owns its configuration record mutably until it
//! connects. Connecting converts the record into a [`Frozen`] snapshot that
//! only hands out shared references; there is no way back.

use std::ops::Deref;
use std::sync::Arc;

use crate::{Error, Result};

/// Immutable snapshot of a configuration record
#[derive(Debug)]
pub struct Frozen<T>(Arc<T>);

impl<T> Frozen<T> {
    pub fn new(config: T) -> Self {
        Self(Arc::new(config))
    }
}

impl<T> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Frozen<T> {
    fn from(config: T) -> Self {
        Self::new(config)
    }
}

/// Configuration of one entity, either still mutable or frozen
#[derive(Debug)]
pub enum ConfigHolder<T> {
    Configurable(T),
    Frozen(Frozen<T>),
}

impl<T> ConfigHolder<T> {
    pub fn new(config: T) -> Self {
        ConfigHolder::Configurable(config)
    }

    /// Read access, valid in both states
    pub fn get(&self) -> &T {
        match self {
            ConfigHolder::Configurable(config) => config,
            ConfigHolder::Frozen(frozen) => frozen,
        }
    }

    /// Mutable access, refused once frozen
    ///
    /// `entity` names the owning entity type in the error.
    pub fn get_mut(&mut self, entity: &'static str) -> Result<&mut T> {
        match self {
            ConfigHolder::Configurable(config) => Ok(config),
            ConfigHolder::Frozen(_) => Err(Error::NotConfigurable { entity }),
        }
    }

    pub fn is_configurable(&self) -> bool {
        matches!(self, ConfigHolder::Configurable(_))
    }

    /// The frozen snapshot, if the transition already happened
    pub fn frozen(&self) -> Option<&Frozen<T>> {
        match self {
            ConfigHolder::Configurable(_) => None,
            ConfigHolder::Frozen(frozen) => Some(frozen),
        }
    }
}

impl<T: Default> ConfigHolder<T> {
    /// Convert into the frozen state; a no-op when already frozen
    pub fn freeze(&mut self) {
        if let ConfigHolder::Configurable(config) = self {
            let config = std::mem::take(config);
            *self = ConfigHolder::Frozen(Frozen::new(config));
        }
    }
}

impl<T: Default> Default for ConfigHolder<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
