use crate::frame::Error;
use crate::names::BinaryName;
use crate::serialize::{Deserialize, Serialize};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;

/// These types are from [this hierarchy][0]
///
/// The class parameter is `u16` (a `CONSTANT_Class` index) in class files, and a resolved name
/// once the constant pool has been consulted.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls> {
    /// Unusable slot
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// Object created by the `new` at this bytecode offset, but whose `<init>` has not been
    /// called yet
    Uninitialized(u16),
}

impl<Cls> VerificationType<Cls> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    pub fn try_map<Cls2, E>(
        &self,
        map_class: impl FnOnce(&Cls) -> Result<Cls2, E>,
    ) -> Result<VerificationType<Cls2>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(off) => VerificationType::Uninitialized(*off),
        })
    }
}

impl<Cls> Width for VerificationType<Cls> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl Serialize for VerificationType<u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType<u16> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(u16::deserialize(reader)?),
            8 => VerificationType::Uninitialized(u16::deserialize(reader)?),
            tag => return Err(Error::BadTag(tag)),
        })
    }
}

/// Same spelling as the text listings accept
impl fmt::Display for VerificationType<BinaryName> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("int"),
            VerificationType::Float => f.write_str("float"),
            VerificationType::Double => f.write_str("double"),
            VerificationType::Long => f.write_str("long"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis => f.write_str("uninit_this"),
            VerificationType::Object(cls) => write!(f, "{}", cls),
            VerificationType::Uninitialized(off) => write!(f, "uninit@{}", off),
        }
    }
}
