//! Registries for the type system backing `Struct`, `Enumeration` and
//! `Object` property values: the set of named shapes an `Instance`
//! knows how to (de)serialize.

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::property::PropertyValueKind;

/// A named enumeration's legal members.
#[derive(Debug, Clone)]
pub struct EnumerationType {
    pub name: String,
    pub members: Vec<String>,
}

/// A named struct's field layout.
#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, PropertyValueKind)>,
}

/// A named class of property object, for snapshot/persistence type
/// tagging.
#[derive(Debug, Clone)]
pub struct PropertyObjectClass {
    pub name: String,
    pub parent: Option<String>,
}

/// Owns the named type registries an `Instance` consults when
/// deserializing a snapshot or a persisted save file: types must be
/// registered before any object referencing them is reconstructed.
#[derive(Default)]
pub struct TypeManager {
    enumerations: DashMap<String, EnumerationType>,
    structs: DashMap<String, StructType>,
    classes: DashMap<String, PropertyObjectClass>,
}

impl TypeManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enumeration(&self, ty: EnumerationType) -> Result<()> {
        if self.enumerations.contains_key(&ty.name) {
            return Err(Error::DuplicateItem(ty.name));
        }
        self.enumerations.insert(ty.name.clone(), ty);
        Ok(())
    }

    pub fn add_struct(&self, ty: StructType) -> Result<()> {
        if self.structs.contains_key(&ty.name) {
            return Err(Error::DuplicateItem(ty.name));
        }
        self.structs.insert(ty.name.clone(), ty);
        Ok(())
    }

    pub fn add_class(&self, ty: PropertyObjectClass) -> Result<()> {
        if self.classes.contains_key(&ty.name) {
            return Err(Error::DuplicateItem(ty.name));
        }
        self.classes.insert(ty.name.clone(), ty);
        Ok(())
    }

    #[must_use]
    pub fn enumeration(&self, name: &str) -> Option<EnumerationType> {
        self.enumerations.get(name).map(|e| e.clone())
    }

    #[must_use]
    pub fn struct_type(&self, name: &str) -> Option<StructType> {
        self.structs.get(name).map(|s| s.clone())
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<PropertyObjectClass> {
        self.classes.get(name).map(|c| c.clone())
    }
}
