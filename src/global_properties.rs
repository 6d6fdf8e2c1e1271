//! Run-wide, read-mostly values stored on a `Context`.
//!
//! A global property is a type defined with `define_global_property!` that
//! names the type of value it holds. Values are usually loaded once from a
//! JSON file with `load_json_file` and stored before the simulation starts.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::trace;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimError;

#[macro_export]
macro_rules! define_global_property {
    ($vis:vis $global_property:ident, $value:ty) => {
        #[derive(Copy, Clone)]
        $vis struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;
        }
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;
}

#[derive(Default)]
struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer::default()
);

pub trait ContextGlobalPropertiesExt {
    /// Sets the value of a global property, replacing any previous value.
    fn set_global_property_value<T: GlobalProperty>(&mut self, property: T, value: T::Value);

    /// Returns the value of a global property, or `None` if it was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;
}

/// Reads and deserializes a JSON file.
///
/// # Errors
///
/// Returns an `IoError` if the file cannot be read and a `JsonError` if it
/// does not deserialize into `T`.
pub fn load_json_file<T: DeserializeOwned>(file_path: &Path) -> Result<T, SimError> {
    trace!("loading {}", file_path.display());
    let contents = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(&mut self, _property: T, value: T::Value) {
        trace!("setting global property {}", std::any::type_name::<T>());
        self.get_data_mut(GlobalPropertiesPlugin)
            .global_property_container
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T::Value>()
    }
}
