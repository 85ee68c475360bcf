//! Typed, named value cells that form a message payload.
//!
//! A [`MessageParameter`] pairs a name with a [`ParamValue`]. The declared
//! [`ParamType`] is fixed when the parameter is created: every later write
//! goes through [`MessageParameter::set`], which rejects values of any
//! other type with [`ParamError::TypeMismatch`].
//!
//! GROUP parameters own a nested, insertion-ordered map of child
//! parameters, which is how structured payloads (for example the set of
//! changed actor properties) travel inside a single message.

use std::fmt;

use indexmap::IndexMap;

use crate::error::ParamError;
use crate::id::ActorId;

/// Ordered children of a GROUP parameter, keyed by name.
pub type ParamGroup = IndexMap<String, MessageParameter>;

/// Declared type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// `bool`.
    Boolean,
    /// `i32`.
    Int,
    /// `u32`.
    UnsignedInt,
    /// `i64`.
    Long,
    /// `f32`.
    Float,
    /// `f64`.
    Double,
    /// UTF-8 string.
    String,
    /// Two `f32` components.
    Vec2,
    /// Three `f32` components.
    Vec3,
    /// Four `f32` components.
    Vec4,
    /// Actor GUID.
    ActorId,
    /// Nested named parameters.
    Group,
}

impl ParamType {
    /// Every type, in wire-tag order.
    pub const ALL: [ParamType; 12] = [
        ParamType::Boolean,
        ParamType::Int,
        ParamType::UnsignedInt,
        ParamType::Long,
        ParamType::Float,
        ParamType::Double,
        ParamType::String,
        ParamType::Vec2,
        ParamType::Vec3,
        ParamType::Vec4,
        ParamType::ActorId,
        ParamType::Group,
    ];

    /// Stable one-byte tag used by wire encoders.
    pub fn tag(self) -> u8 {
        match self {
            ParamType::Boolean => 1,
            ParamType::Int => 2,
            ParamType::UnsignedInt => 3,
            ParamType::Long => 4,
            ParamType::Float => 5,
            ParamType::Double => 6,
            ParamType::String => 7,
            ParamType::Vec2 => 8,
            ParamType::Vec3 => 9,
            ParamType::Vec4 => 10,
            ParamType::ActorId => 11,
            ParamType::Group => 12,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Option<ParamType> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// Upper-case type name.
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Boolean => "BOOLEAN",
            ParamType::Int => "INT",
            ParamType::UnsignedInt => "UINT",
            ParamType::Long => "LONGINT",
            ParamType::Float => "FLOAT",
            ParamType::Double => "DOUBLE",
            ParamType::String => "STRING",
            ParamType::Vec2 => "VEC2",
            ParamType::Vec3 => "VEC3",
            ParamType::Vec4 => "VEC4",
            ParamType::ActorId => "ACTOR",
            ParamType::Group => "GROUP",
        }
    }

    /// The zero value of this type.
    pub fn default_value(self) -> ParamValue {
        match self {
            ParamType::Boolean => ParamValue::Boolean(false),
            ParamType::Int => ParamValue::Int(0),
            ParamType::UnsignedInt => ParamValue::UnsignedInt(0),
            ParamType::Long => ParamValue::Long(0),
            ParamType::Float => ParamValue::Float(0.0),
            ParamType::Double => ParamValue::Double(0.0),
            ParamType::String => ParamValue::String(String::new()),
            ParamType::Vec2 => ParamValue::Vec2([0.0; 2]),
            ParamType::Vec3 => ParamValue::Vec3([0.0; 3]),
            ParamType::Vec4 => ParamValue::Vec4([0.0; 4]),
            ParamType::ActorId => ParamValue::ActorId(ActorId::NULL),
            ParamType::Group => ParamValue::Group(ParamGroup::new()),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameter value. The variant determines the [`ParamType`].
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// See [`ParamType::Boolean`].
    Boolean(bool),
    /// See [`ParamType::Int`].
    Int(i32),
    /// See [`ParamType::UnsignedInt`].
    UnsignedInt(u32),
    /// See [`ParamType::Long`].
    Long(i64),
    /// See [`ParamType::Float`].
    Float(f32),
    /// See [`ParamType::Double`].
    Double(f64),
    /// See [`ParamType::String`].
    String(String),
    /// See [`ParamType::Vec2`].
    Vec2([f32; 2]),
    /// See [`ParamType::Vec3`].
    Vec3([f32; 3]),
    /// See [`ParamType::Vec4`].
    Vec4([f32; 4]),
    /// See [`ParamType::ActorId`].
    ActorId(ActorId),
    /// See [`ParamType::Group`].
    Group(ParamGroup),
}

impl ParamValue {
    /// The type tag of this value.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::UnsignedInt(_) => ParamType::UnsignedInt,
            ParamValue::Long(_) => ParamType::Long,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Double(_) => ParamType::Double,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Vec2(_) => ParamType::Vec2,
            ParamValue::Vec3(_) => ParamType::Vec3,
            ParamValue::Vec4(_) => ParamType::Vec4,
            ParamValue::ActorId(_) => ParamType::ActorId,
            ParamValue::Group(_) => ParamType::Group,
        }
    }

    /// The value as a `bool`, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `i32`, if it is one.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a `u32`, if it is one.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ParamValue::UnsignedInt(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `f32`, if it is one.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `f64`, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a 3-vector, if it is one.
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an actor id, if it is one.
    pub fn as_actor_id(&self) -> Option<ActorId> {
        match self {
            ParamValue::ActorId(v) => Some(*v),
            _ => None,
        }
    }

    /// The nested children, if this is a group.
    pub fn as_group(&self) -> Option<&ParamGroup> {
        match self {
            ParamValue::Group(g) => Some(g),
            _ => None,
        }
    }
}

fn write_components(f: &mut fmt::Formatter<'_>, v: &[f32]) -> fmt::Result {
    for (i, c) in v.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Boolean(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::UnsignedInt(v) => write!(f, "{v}"),
            ParamValue::Long(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Double(v) => write!(f, "{v}"),
            ParamValue::String(v) => f.write_str(v),
            ParamValue::Vec2(v) => write_components(f, v),
            ParamValue::Vec3(v) => write_components(f, v),
            ParamValue::Vec4(v) => write_components(f, v),
            ParamValue::ActorId(v) => write!(f, "{v}"),
            ParamValue::Group(g) => {
                f.write_str("{")?;
                for (i, p) in g.values().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", p.name(), p.value())?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for ParamValue {
            fn from(v: $ty) -> Self {
                ParamValue::$variant(v)
            }
        })*
    };
}

impl_from_value! {
    bool => Boolean,
    i32 => Int,
    u32 => UnsignedInt,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    ActorId => ActorId,
    ParamGroup => Group,
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

/// A named, typed value cell.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageParameter {
    name: String,
    value: ParamValue,
}

impl MessageParameter {
    /// New parameter holding the zero value of `ty`.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            value: ty.default_value(),
        }
    }

    /// New parameter whose declared type is taken from `value`.
    pub fn with_value(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn param_type(&self) -> ParamType {
        self.value.param_type()
    }

    /// Current value.
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Assign a new value of the declared type.
    ///
    /// # Errors
    ///
    /// [`ParamError::TypeMismatch`] if `value` has a different type. The
    /// stored value is left untouched.
    pub fn set(&mut self, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        let value = value.into();
        let found = value.param_type();
        if found != self.param_type() {
            return Err(ParamError::TypeMismatch {
                name: self.name.clone(),
                expected: self.param_type(),
                found,
            });
        }
        self.value = value;
        Ok(())
    }

    /// Reset to the zero value of the declared type.
    pub fn clear(&mut self) {
        self.value = self.param_type().default_value();
    }

    /// Parse `input` as a value of the declared type and assign it.
    ///
    /// Vectors are whitespace-separated components. Groups have no string
    /// form and always fail.
    pub fn set_from_str(&mut self, input: &str) -> Result<(), ParamError> {
        let ty = self.param_type();
        let invalid = || ParamError::InvalidValue {
            name: self.name.clone(),
            expected: ty,
            input: input.to_string(),
        };
        let trimmed = input.trim();
        let value = match ty {
            ParamType::Boolean => match trimmed {
                "true" | "1" => ParamValue::Boolean(true),
                "false" | "0" => ParamValue::Boolean(false),
                _ => return Err(invalid()),
            },
            ParamType::Int => ParamValue::Int(trimmed.parse().map_err(|_| invalid())?),
            ParamType::UnsignedInt => {
                ParamValue::UnsignedInt(trimmed.parse().map_err(|_| invalid())?)
            }
            ParamType::Long => ParamValue::Long(trimmed.parse().map_err(|_| invalid())?),
            ParamType::Float => ParamValue::Float(trimmed.parse().map_err(|_| invalid())?),
            ParamType::Double => ParamValue::Double(trimmed.parse().map_err(|_| invalid())?),
            ParamType::String => ParamValue::String(input.to_string()),
            ParamType::Vec2 => ParamValue::Vec2(parse_components(trimmed).ok_or_else(invalid)?),
            ParamType::Vec3 => ParamValue::Vec3(parse_components(trimmed).ok_or_else(invalid)?),
            ParamType::Vec4 => ParamValue::Vec4(parse_components(trimmed).ok_or_else(invalid)?),
            ParamType::ActorId => ParamValue::ActorId(trimmed.parse().map_err(|_| invalid())?),
            ParamType::Group => return Err(invalid()),
        };
        self.value = value;
        Ok(())
    }

    // ── Group access ────────────────────────────────────────────

    fn group(&self) -> Result<&ParamGroup, ParamError> {
        match &self.value {
            ParamValue::Group(g) => Ok(g),
            _ => Err(ParamError::NotAGroup {
                name: self.name.clone(),
            }),
        }
    }

    fn group_mut(&mut self) -> Result<&mut ParamGroup, ParamError> {
        match &mut self.value {
            ParamValue::Group(g) => Ok(g),
            _ => Err(ParamError::NotAGroup {
                name: self.name.clone(),
            }),
        }
    }

    /// Append a child to a GROUP parameter.
    pub fn add_child(&mut self, child: MessageParameter) -> Result<(), ParamError> {
        let group = self.group_mut()?;
        if group.contains_key(child.name()) {
            return Err(ParamError::DuplicateParameter {
                name: child.name,
            });
        }
        group.insert(child.name.clone(), child);
        Ok(())
    }

    /// Look up a child of a GROUP parameter.
    pub fn child(&self, name: &str) -> Result<&MessageParameter, ParamError> {
        self.group()?
            .get(name)
            .ok_or_else(|| ParamError::UnknownParameter {
                name: name.to_string(),
            })
    }

    /// Mutable lookup of a child of a GROUP parameter.
    pub fn child_mut(&mut self, name: &str) -> Result<&mut MessageParameter, ParamError> {
        self.group_mut()?
            .get_mut(name)
            .ok_or_else(|| ParamError::UnknownParameter {
                name: name.to_string(),
            })
    }
}

fn parse_components<const N: usize>(s: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = s.split_whitespace();
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_checks_declared_type() {
        let mut p = MessageParameter::new("speed", ParamType::Float);
        p.set(3.5f32).unwrap();
        assert_eq!(p.value().as_f32(), Some(3.5));

        let err = p.set(1.0f64).unwrap_err();
        assert_eq!(
            err,
            ParamError::TypeMismatch {
                name: "speed".into(),
                expected: ParamType::Float,
                found: ParamType::Double,
            }
        );
        // Value and type unchanged after a rejected write.
        assert_eq!(p.value().as_f32(), Some(3.5));
        assert_eq!(p.param_type(), ParamType::Float);
    }

    #[test]
    fn tags_are_unique_and_invertible() {
        for ty in ParamType::ALL {
            assert_eq!(ParamType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ParamType::from_tag(0), None);
        assert_eq!(ParamType::from_tag(200), None);
    }

    #[test]
    fn group_children_keep_insertion_order() {
        let mut g = MessageParameter::new("props", ParamType::Group);
        g.add_child(MessageParameter::with_value("b", 1)).unwrap();
        g.add_child(MessageParameter::with_value("a", "x")).unwrap();
        let names: Vec<&str> = g
            .value()
            .as_group()
            .unwrap()
            .values()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, ["b", "a"]);

        assert!(matches!(
            g.add_child(MessageParameter::with_value("a", 2)),
            Err(ParamError::DuplicateParameter { .. })
        ));
        g.child_mut("b").unwrap().set(7).unwrap();
        assert_eq!(g.child("b").unwrap().value().as_i32(), Some(7));
    }

    #[test]
    fn scalar_is_not_a_group() {
        let mut p = MessageParameter::new("n", ParamType::Int);
        assert!(matches!(
            p.add_child(MessageParameter::new("x", ParamType::Int)),
            Err(ParamError::NotAGroup { .. })
        ));
    }

    #[test]
    fn string_form_round_trips() {
        let mut p = MessageParameter::new("pos", ParamType::Vec3);
        p.set_from_str("1 2.5 -3").unwrap();
        assert_eq!(p.value().as_vec3(), Some([1.0, 2.5, -3.0]));
        let text = p.value().to_string();
        let mut q = MessageParameter::new("pos", ParamType::Vec3);
        q.set_from_str(&text).unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn bad_string_form_is_rejected() {
        let mut p = MessageParameter::new("pos", ParamType::Vec3);
        assert!(p.set_from_str("1 2").is_err());
        assert!(p.set_from_str("1 2 3 4").is_err());
        let mut b = MessageParameter::new("on", ParamType::Boolean);
        assert!(b.set_from_str("maybe").is_err());
        b.set_from_str("1").unwrap();
        assert_eq!(b.value().as_bool(), Some(true));
    }

    #[test]
    fn clear_restores_zero_value() {
        let mut p = MessageParameter::with_value("label", "hello");
        p.clear();
        assert_eq!(p.value().as_str(), Some(""));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn long_string_form_round_trips(v in any::<i64>()) {
                let mut p = MessageParameter::new("n", ParamType::Long);
                p.set_from_str(&ParamValue::Long(v).to_string()).unwrap();
                prop_assert_eq!(p.value().as_i64(), Some(v));
            }

            #[test]
            fn vec3_string_form_round_trips(
                x in -1.0e6f32..1.0e6,
                y in -1.0e6f32..1.0e6,
                z in -1.0e6f32..1.0e6,
            ) {
                let mut p = MessageParameter::new("pos", ParamType::Vec3);
                p.set_from_str(&ParamValue::Vec3([x, y, z]).to_string()).unwrap();
                prop_assert_eq!(p.value().as_vec3(), Some([x, y, z]));
            }

            #[test]
            fn rejected_writes_leave_the_value(v in any::<f64>()) {
                let mut p = MessageParameter::with_value("count", 5);
                prop_assert!(p.set(v).is_err());
                prop_assert_eq!(p.value().as_i32(), Some(5));
            }
        }
    }
}
