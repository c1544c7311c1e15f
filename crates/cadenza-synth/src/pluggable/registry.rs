//! Name-indexed pluggable processor factories.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::ToString, sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use super::{
    PluggableConfig, PluggableProcessorFactory, PluggableProcessorTemplate, SoftClipFactory,
    UserEffectFactory, validate_config,
};
use crate::effect::EffectRole;
use crate::error::{Result, SynthError};

/// Describes a registered factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorDescriptor {
    /// Registry name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Number of accepted configuration keys.
    pub key_count: usize,
}

/// Registry of pluggable processor factories.
///
/// `new` registers the built-in factories; more can be added with
/// [`PluggableRegistry::register`]. A later registration under an existing
/// name replaces the earlier one.
pub struct PluggableRegistry {
    factories: Vec<Box<dyn PluggableProcessorFactory>>,
}

impl Default for PluggableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluggableRegistry {
    /// Creates a registry holding the built-in factories.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: Vec::with_capacity(2),
        };
        registry.register(Box::new(UserEffectFactory));
        registry.register(Box::new(SoftClipFactory));
        registry
    }

    /// Creates a registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Adds or replaces a factory.
    pub fn register(&mut self, factory: Box<dyn PluggableProcessorFactory>) {
        if let Some(slot) = self.factories.iter_mut().find(|f| f.name() == factory.name()) {
            *slot = factory;
        } else {
            self.factories.push(factory);
        }
    }

    /// Looks up a factory by name.
    pub fn get(&self, name: &str) -> Option<&dyn PluggableProcessorFactory> {
        self.factories
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Descriptors of every registered factory.
    pub fn all(&self) -> impl Iterator<Item = ProcessorDescriptor> + '_ {
        self.factories.iter().map(|f| ProcessorDescriptor {
            name: f.name(),
            description: f.description(),
            key_count: f.config_keys().len(),
        })
    }

    /// Validates `config` and creates a template with the named factory.
    pub fn create_template(
        &self,
        name: &str,
        config: &PluggableConfig,
        role: EffectRole,
    ) -> Result<Arc<dyn PluggableProcessorTemplate>> {
        let factory = self
            .get(name)
            .ok_or_else(|| SynthError::UnknownProcessor(name.to_string()))?;
        validate_config(name, factory.config_keys(), config)?;
        factory.create_template(config, role)
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True when no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl core::fmt::Debug for PluggableRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}
