//! Unit registry: the closed catalog of available unit types.
//!
//! The registry maps type identifiers to constructors so that modules can
//! be instantiated by id, once at creation time, never per block.

use std::collections::HashMap;

use super::unit::{DspUnit, UnitInfo};

/// Factory function type for creating unit instances.
pub type UnitFactory = fn() -> Box<dyn DspUnit>;

/// Catalog of available unit types, keyed by their static type id.
///
/// Both sides of the engine hold one: the wiring adapter uses it to read a
/// type's port and parameter declarations, the render graph uses it to
/// construct the unit that actually runs. Cloning is cheap (the factories
/// are plain function pointers).
#[derive(Clone)]
pub struct UnitRegistry {
    factories: HashMap<&'static str, UnitFactory>,
    infos: Vec<UnitInfo>,
}

impl UnitRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            infos: Vec::new(),
        }
    }

    /// Registers a unit type.
    ///
    /// A temporary instance is created to read the type's info.
    ///
    /// # Panics
    ///
    /// Panics if a unit with the same id is already registered; the catalog
    /// is assembled once at startup and a duplicate id is a programming
    /// error.
    pub fn register<U: DspUnit + Default + 'static>(&mut self) {
        let temp = U::default();
        let info = temp.info().clone();
        let id = info.id;

        if self.factories.contains_key(id) {
            panic!("unit type '{}' is already registered", id);
        }

        self.factories.insert(id, create_unit::<U>);
        self.infos.push(info);
    }

    /// Creates a new instance of a unit type by id.
    ///
    /// Returns `None` if no such type is registered.
    pub fn create(&self, id: &str) -> Option<Box<dyn DspUnit>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Resolves an arbitrary string (e.g. from a loaded patch) to the
    /// registry's static id for that type.
    pub fn canonical_id(&self, id: &str) -> Option<&'static str> {
        self.factories.get_key_value(id).map(|(&key, _)| key)
    }

    /// Lists all registered unit types.
    pub fn list_units(&self) -> &[UnitInfo] {
        &self.infos
    }

    /// Returns the number of registered unit types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no unit types are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Checks whether a unit type id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_unit<U: DspUnit + Default + 'static>() -> Box<dyn DspUnit> {
    Box::new(U::default())
}
