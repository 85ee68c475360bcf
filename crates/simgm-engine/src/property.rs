//! Actor types and their property schemas.
//!
//! An [`ActorType`] is built once and shared by every actor of that type.
//! Its schema maps property names to a declared [`ParamType`], a default
//! value and an access flag; actor property bags are validated against it
//! on every write.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use simgm_core::{ParamType, ParamValue};

use crate::actor::{ActorComponent, GameActor};
use crate::error::GmError;
use simgm_core::ActorId;

/// Constructor for a component attached to every actor of a type.
pub type ActorComponentBuilder = fn() -> Box<dyn ActorComponent>;

/// Declaration of one actor property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDef {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub ty: ParamType,
    /// Initial value.
    pub default: ParamValue,
    /// Whether local writers are refused. Remote updates still apply.
    pub read_only: bool,
}

/// Descriptor shared by all actors of one type.
pub struct ActorType {
    name: String,
    category: String,
    properties: IndexMap<String, PropertyDef>,
    components: Vec<ActorComponentBuilder>,
}

impl ActorType {
    /// Start building a type.
    pub fn builder(name: impl Into<String>, category: impl Into<String>) -> ActorTypeBuilder {
        ActorTypeBuilder {
            ty: ActorType {
                name: name.into(),
                category: category.into(),
                properties: IndexMap::new(),
                components: Vec::new(),
            },
        }
    }

    /// Type name, unique within a registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form category, e.g. `"vehicles"`.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Declaration of a property.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// All property declarations in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.values()
    }
}

impl fmt::Debug for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorType")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("properties", &self.properties.len())
            .field("components", &self.components.len())
            .finish()
    }
}

/// Builder for [`ActorType`].
pub struct ActorTypeBuilder {
    ty: ActorType,
}

impl ActorTypeBuilder {
    /// Declare a writable property whose type is taken from `default`.
    /// Redeclaring a name replaces the earlier declaration.
    pub fn property(self, name: impl Into<String>, default: impl Into<ParamValue>) -> Self {
        self.declare(name.into(), default.into(), false)
    }

    /// Declare a property local writers may not change.
    pub fn read_only_property(
        self,
        name: impl Into<String>,
        default: impl Into<ParamValue>,
    ) -> Self {
        self.declare(name.into(), default.into(), true)
    }

    fn declare(mut self, name: String, default: ParamValue, read_only: bool) -> Self {
        let def = PropertyDef {
            name: name.clone(),
            ty: default.param_type(),
            default,
            read_only,
        };
        self.ty.properties.insert(name, def);
        self
    }

    /// Attach a component to every actor of this type.
    pub fn component(mut self, builder: ActorComponentBuilder) -> Self {
        self.ty.components.push(builder);
        self
    }

    /// Finish the type.
    pub fn build(self) -> Arc<ActorType> {
        Arc::new(self.ty)
    }
}

/// Registry of actor types, used to instantiate actors by type name (for
/// example when a remote peer announces an actor this machine has not seen).
#[derive(Default)]
pub struct ActorTypeRegistry {
    types: IndexMap<String, Arc<ActorType>>,
}

impl ActorTypeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type.
    ///
    /// # Errors
    ///
    /// [`GmError::DuplicateActorType`] if a different type with the same
    /// name is registered. Registering the same `Arc` twice is a no-op.
    pub fn register(&mut self, ty: Arc<ActorType>) -> Result<(), GmError> {
        if let Some(existing) = self.types.get(ty.name()) {
            if Arc::ptr_eq(existing, &ty) {
                return Ok(());
            }
            return Err(GmError::DuplicateActorType {
                name: ty.name().to_string(),
            });
        }
        self.types.insert(ty.name().to_string(), ty);
        Ok(())
    }

    /// Type by name.
    pub fn get(&self, name: &str) -> Option<&Arc<ActorType>> {
        self.types.get(name)
    }

    /// Registered type names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Instantiate an actor of type `name` with the type's components.
    ///
    /// # Errors
    ///
    /// [`GmError::UnknownActorType`] if `name` is not registered.
    pub fn instantiate(&self, name: &str, id: ActorId, remote: bool) -> Result<GameActor, GmError> {
        let ty = self.get(name).ok_or_else(|| GmError::UnknownActorType {
            name: name.to_string(),
        })?;
        let mut actor = GameActor::new(id, Arc::clone(ty), remote);
        for build in &ty.components {
            actor.add_component(build())?;
        }
        Ok(actor)
    }
}

impl fmt::Debug for ActorTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}
