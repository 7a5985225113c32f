use crate::descriptors::{BaseType, FieldType};
use crate::names::BinaryName;
use crate::util::Width;
use std::fmt;

/// Storage kind of a frame slot
///
/// Sub-word values (`boolean`, `byte`, `char`, `short`) are stored as `Int`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Int,
    Float,
    Long,
    Double,
    Reference,
    Illegal,
}

impl SlotKind {
    /// Does a value of this kind take two slots?
    pub fn needs_two_slots(self) -> bool {
        matches!(self, SlotKind::Long | SlotKind::Double)
    }

    /// Is this a primitive kind?
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SlotKind::Int | SlotKind::Float | SlotKind::Long | SlotKind::Double
        )
    }
}

/// Static type of one slot of a frame
///
/// `Null` and `Object` are both of kind [`SlotKind::Reference`]: `Null` is a reference whose type
/// has not been narrowed to a class yet. Equality compares the tag and, for `Object`, the class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotType<C = BinaryName> {
    Int,
    Float,
    Long,
    Double,
    Null,
    Object(C),

    /// Dead slot, or the lower half of a two-slot value on the stack
    Illegal,
}

impl<C> SlotType<C> {
    pub fn kind(&self) -> SlotKind {
        match self {
            SlotType::Int => SlotKind::Int,
            SlotType::Float => SlotKind::Float,
            SlotType::Long => SlotKind::Long,
            SlotType::Double => SlotKind::Double,
            SlotType::Null | SlotType::Object(_) => SlotKind::Reference,
            SlotType::Illegal => SlotKind::Illegal,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.kind().is_primitive()
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, SlotType::Null | SlotType::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SlotType::Null)
    }

    pub fn is_illegal(&self) -> bool {
        matches!(self, SlotType::Illegal)
    }

    /// Declared class of an object slot
    pub fn class(&self) -> Option<&C> {
        match self {
            SlotType::Object(cls) => Some(cls),
            _ => None,
        }
    }

    pub fn map<C2>(&self, map_class: impl FnOnce(&C) -> C2) -> SlotType<C2> {
        match self {
            SlotType::Int => SlotType::Int,
            SlotType::Float => SlotType::Float,
            SlotType::Long => SlotType::Long,
            SlotType::Double => SlotType::Double,
            SlotType::Null => SlotType::Null,
            SlotType::Object(cls) => SlotType::Object(map_class(cls)),
            SlotType::Illegal => SlotType::Illegal,
        }
    }
}

impl<C> Width for SlotType<C> {
    fn width(&self) -> usize {
        if self.kind().needs_two_slots() {
            2
        } else {
            1
        }
    }
}

impl<C> From<BaseType> for SlotType<C> {
    fn from(base_type: BaseType) -> Self {
        match base_type {
            BaseType::Int
            | BaseType::Char
            | BaseType::Short
            | BaseType::Byte
            | BaseType::Boolean => SlotType::Int,
            BaseType::Float => SlotType::Float,
            BaseType::Long => SlotType::Long,
            BaseType::Double => SlotType::Double,
        }
    }
}

impl From<&FieldType> for SlotType<BinaryName> {
    fn from(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Base(base_type) => SlotType::from(*base_type),
            FieldType::Object(name) | FieldType::Array(name) => SlotType::Object(name.clone()),
        }
    }
}

impl<C: fmt::Display> fmt::Display for SlotType<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Int => f.write_str("int"),
            SlotType::Float => f.write_str("float"),
            SlotType::Long => f.write_str("long"),
            SlotType::Double => f.write_str("double"),
            SlotType::Null => f.write_str("null"),
            SlotType::Object(cls) => cls.fmt(f),
            SlotType::Illegal => f.write_str("illegal"),
        }
    }
}
