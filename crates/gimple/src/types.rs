//! The translator's representation of GIMPLE types, as emitted by the GCC
//! plugin.

use std::fmt::{Display, Formatter};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A representation of the GIMPLE types that the translator understands.
///
/// # Structural Equality
///
/// Two types are equal if they are the same variant and their widths, bases,
/// lengths, names and fields are equal recursively. Nothing here is compared by
/// identity, and so the type is also usable as a key for caches that should
/// treat structurally-equal types as one.
///
/// # Wire Format
///
/// Each variant is tagged by the `type` property in the plugin output, using
/// the name of the GCC tree code it corresponds to. Any tag not listed here is
/// rejected when reading.
///
/// # Value Semantics
///
/// It is intended that this type is used as having value semantics, and it is
/// cheap enough to clone that we do so freely.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GimpleType {
    /// A signed integer of the provided bit width.
    #[serde(rename = "integer_type")]
    Integer {
        #[serde(alias = "precision")]
        width: u32,
    },

    /// A binary floating-point number of the provided bit width.
    #[serde(rename = "real_type")]
    Real {
        #[serde(alias = "precision")]
        width: u32,
    },

    /// The C++ `bool` type, or the result of a comparison.
    #[serde(rename = "boolean_type")]
    Boolean,

    /// A native pointer, which may be null and may be reseated.
    #[serde(rename = "pointer_type")]
    Pointer {
        #[serde(rename = "base_type")]
        base: Box<GimpleType>,
    },

    /// A C++ reference, which is never null and never reseated.
    #[serde(rename = "reference_type")]
    Reference {
        #[serde(rename = "base_type")]
        base: Box<GimpleType>,
    },

    /// A fixed-length array of elements of type `base`.
    #[serde(rename = "array_type")]
    Array {
        #[serde(rename = "base_type")]
        base: Box<GimpleType>,

        /// The number of elements in the array.
        length: usize,
    },

    /// A C-style aggregate with named, ordered fields.
    ///
    /// A record with an empty list of fields is treated as a _forward
    /// reference_ to the record definition with the same name in the
    /// compilation unit. This is how self-referential records are expressed.
    #[serde(rename = "record_type")]
    Record {
        /// The tag name of the record, or the empty string if it is anonymous.
        #[serde(default)]
        name: String,

        /// The fields of the record, in declaration order.
        #[serde(default)]
        fields: Vec<GimpleField>,
    },
}

/// A single named field of a [`GimpleType::Record`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct GimpleField {
    /// The name of the field.
    pub name: String,

    /// The type of the field.
    #[serde(rename = "type")]
    pub ty: GimpleType,
}

impl GimpleField {
    /// Creates a new field with the provided `name` and type `ty`.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: GimpleType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The discriminant of a [`GimpleType`], without any of its payload.
///
/// This is used to answer questions like "is this a pointer to a record"
/// without needing to construct a full type to compare against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TypeKind {
    Integer,
    Real,
    Boolean,
    Pointer,
    Reference,
    Array,
    Record,
}

impl TypeKind {
    /// Gets the stable on-wire tag for this kind of type.
    #[must_use]
    pub fn wire_tag(self) -> &'static str {
        match self {
            TypeKind::Integer => "integer_type",
            TypeKind::Real => "real_type",
            TypeKind::Boolean => "boolean_type",
            TypeKind::Pointer => "pointer_type",
            TypeKind::Reference => "reference_type",
            TypeKind::Array => "array_type",
            TypeKind::Record => "record_type",
        }
    }
}

/// Additional utility constructors for creating the compound types without
/// having to manage boxing manually.
impl GimpleType {
    /// Builds an integer type of the provided `width` in bits.
    #[must_use]
    pub fn int(width: u32) -> Self {
        Self::Integer { width }
    }

    /// Builds a real type of the provided `width` in bits.
    #[must_use]
    pub fn real(width: u32) -> Self {
        Self::Real { width }
    }

    /// Builds a pointer type pointing at values of type `base`.
    #[must_use]
    pub fn make_pointer(base: GimpleType) -> Self {
        Self::Pointer {
            base: Box::new(base),
        }
    }

    /// Builds a reference type referring to values of type `base`.
    #[must_use]
    pub fn make_reference(base: GimpleType) -> Self {
        Self::Reference {
            base: Box::new(base),
        }
    }

    /// Builds an array type containing `length` elements of type `base`.
    #[must_use]
    pub fn make_array(base: GimpleType, length: usize) -> Self {
        Self::Array {
            base: Box::new(base),
            length,
        }
    }

    /// Builds a record type with the provided `name` and `fields`.
    #[must_use]
    pub fn make_record(name: impl Into<String>, fields: &[GimpleField]) -> Self {
        Self::Record {
            name:   name.into(),
            fields: Vec::from(fields),
        }
    }
}

/// Operations for working with GIMPLE types, such as asserting properties on
/// them, or processing them.
impl GimpleType {
    /// Gets the kind of `self`.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Integer { .. } => TypeKind::Integer,
            Self::Real { .. } => TypeKind::Real,
            Self::Boolean => TypeKind::Boolean,
            Self::Pointer { .. } => TypeKind::Pointer,
            Self::Reference { .. } => TypeKind::Reference,
            Self::Array { .. } => TypeKind::Array,
            Self::Record { .. } => TypeKind::Record,
        }
    }

    /// Gets the stable on-wire tag for `self`.
    #[must_use]
    pub fn wire_tag(&self) -> &'static str {
        self.kind().wire_tag()
    }

    /// Returns `true` if `self` is an integer, real, or boolean type.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Real { .. } | Self::Boolean)
    }

    /// Returns `true` if `self` is an integer type of any width.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self, Self::Integer { .. })
    }

    /// Returns `true` if `self` is a real type of any width.
    #[must_use]
    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real { .. })
    }

    /// Returns `true` if `self` is a record type.
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Returns `true` if `self` is an indirect type, namely a pointer or a
    /// reference.
    #[must_use]
    pub fn is_indirect(&self) -> bool {
        matches!(self, Self::Pointer { .. } | Self::Reference { .. })
    }

    /// Returns `true` if `self` is an indirect type whose base is of the
    /// provided `kind`.
    #[must_use]
    pub fn is_pointer_to(&self, kind: TypeKind) -> bool {
        self.indirect_base().is_some_and(|base| base.kind() == kind)
    }

    /// Gets the base of `self` if it is a pointer or a reference, and returns
    /// [`None`] otherwise.
    #[must_use]
    pub fn indirect_base(&self) -> Option<&GimpleType> {
        match self {
            Self::Pointer { base } | Self::Reference { base } => Some(base),
            _ => None,
        }
    }

    /// Returns `true` if `self` may hold a null value.
    ///
    /// Only pointers are nullable. References never alias a null slot.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }

    /// Returns `true` if `self` is a record without any fields, and hence a
    /// forward reference to a definition elsewhere in the compilation unit.
    #[must_use]
    pub fn is_forward_record(&self) -> bool {
        matches!(self, Self::Record { fields, .. } if fields.is_empty())
    }

    /// Gets the fields of `self` if it is a record type, and returns [`None`]
    /// otherwise.
    #[must_use]
    pub fn record_fields(&self) -> Option<&[GimpleField]> {
        match self {
            Self::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

/// This renders types in a C-like syntax that is used in our diagnostics.
impl Display for GimpleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GimpleType::Integer { width } => write!(f, "int{width}"),
            GimpleType::Real { width } => write!(f, "real{width}"),
            GimpleType::Boolean => write!(f, "bool"),
            GimpleType::Pointer { base } => write!(f, "{base}*"),
            GimpleType::Reference { base } => write!(f, "{base}&"),
            GimpleType::Array { base, length } => write!(f, "{base}[{length}]"),
            GimpleType::Record { name, fields } => {
                if name.is_empty() {
                    let fields_str = fields
                        .iter()
                        .map(|field| format!("{}: {}", field.name, field.ty))
                        .join(", ");
                    write!(f, "struct {{ {fields_str} }}")
                } else {
                    write!(f, "struct {name}")
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::types::{GimpleField, GimpleType, TypeKind};

    #[test]
    fn equality_is_structural() {
        let a = GimpleType::make_record("point", &[
            GimpleField::new("x", GimpleType::int(32)),
            GimpleField::new("y", GimpleType::real(64)),
        ]);
        let b = GimpleType::make_record("point", &[
            GimpleField::new("x", GimpleType::int(32)),
            GimpleField::new("y", GimpleType::real(64)),
        ]);
        let c = GimpleType::make_record("point", &[
            GimpleField::new("y", GimpleType::real(64)),
            GimpleField::new("x", GimpleType::int(32)),
        ]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(GimpleType::int(32), GimpleType::int(64));
        assert_ne!(
            GimpleType::make_pointer(GimpleType::int(32)),
            GimpleType::make_reference(GimpleType::int(32))
        );
    }

    #[test]
    fn pointers_and_references_are_both_indirect() {
        let rec = GimpleType::make_record("s", &[]);
        let ptr = GimpleType::make_pointer(rec.clone());
        let reference = GimpleType::make_reference(rec.clone());

        assert!(ptr.is_pointer_to(TypeKind::Record));
        assert!(reference.is_pointer_to(TypeKind::Record));
        assert!(!rec.is_pointer_to(TypeKind::Record));
        assert!(ptr.is_nullable());
        assert!(!reference.is_nullable());
    }

    #[test]
    fn renders_c_like_text() {
        let ty = GimpleType::make_array(
            GimpleType::make_pointer(GimpleType::make_record("node", &[])),
            4,
        );
        assert_eq!(ty.to_string(), "struct node*[4]");
        assert_eq!(GimpleType::real(64).to_string(), "real64");
    }

    #[test]
    fn reads_tagged_types() -> anyhow::Result<()> {
        let json = r#"{
            "type": "pointer_type",
            "base_type": {
                "type": "record_type",
                "name": "s",
                "fields": [{ "name": "a", "type": { "type": "integer_type", "precision": 32 } }]
            }
        }"#;
        let ty: GimpleType = serde_json::from_str(json)?;

        assert_eq!(
            ty,
            GimpleType::make_pointer(GimpleType::make_record("s", &[GimpleField::new(
                "a",
                GimpleType::int(32)
            )]))
        );
        assert_eq!(ty.wire_tag(), "pointer_type");

        Ok(())
    }
}
