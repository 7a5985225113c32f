//! Binary encoding of frame layouts
//!
//! Descriptors are computed from stack map tables, which is not free. The encoding here lets a
//! runtime persist them next to the method they describe, using the same conventions as class
//! files: big-endian integers, `u8` tags, and `u16` lengths in front of sequences.

use crate::frame::{Error, FrameDescriptor, SlotType};
use crate::names::BinaryName;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{ErrorKind, Result};

pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

pub trait Deserialize: Sized {
    /// Read back a construct written with [`Serialize::serialize`]
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error>;
}

/// Narrow a length or limit to the `u16` it is written as
pub(crate) fn u16_length(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        let msg = format!("{} {} does not fit in a u16", what, value);
        std::io::Error::new(ErrorKind::InvalidInput, msg)
    })
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u8()?)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Deserialize for u16 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u16::<BigEndian>()?)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u32::<BigEndian>()?)
    }
}

impl Serialize for u64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<BigEndian>(*self)
    }
}

impl Deserialize for u64 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u64::<BigEndian>()?)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        u16_length(self.len(), "sequence length")?.serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        (0..len).map(|_| A::deserialize(reader)).collect()
    }
}

/// Length-prefixed UTF-8
impl Serialize for BinaryName {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.as_str().as_bytes();
        u16_length(bytes.len(), "name length")?.serialize(writer)?;
        writer.write_all(bytes)
    }
}

impl Deserialize for BinaryName {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        let mut bytes = vec![0; len as usize];
        reader.read_exact(&mut bytes)?;
        let name = String::from_utf8(bytes)
            .map_err(|err| Error::BadDescriptor(format!("class name is not UTF-8: {}", err)))?;
        BinaryName::from_string(name).map_err(Error::BadDescriptor)
    }
}

/// Tags follow the verification type tags of class files (`Illegal` is `Top`)
impl Serialize for SlotType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            SlotType::Illegal => 0u8.serialize(writer)?,
            SlotType::Int => 1u8.serialize(writer)?,
            SlotType::Float => 2u8.serialize(writer)?,
            SlotType::Double => 3u8.serialize(writer)?,
            SlotType::Long => 4u8.serialize(writer)?,
            SlotType::Null => 5u8.serialize(writer)?,
            SlotType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for SlotType {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            0 => SlotType::Illegal,
            1 => SlotType::Int,
            2 => SlotType::Float,
            3 => SlotType::Double,
            4 => SlotType::Long,
            5 => SlotType::Null,
            7 => SlotType::Object(BinaryName::deserialize(reader)?),
            tag => return Err(Error::BadTag(tag)),
        })
    }
}

/// Limits first (`max_locals`, `max_stack`, `top`), then every slot including slot 0
impl Serialize for FrameDescriptor {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        u16_length(self.max_locals(), "max locals")?.serialize(writer)?;
        u16_length(self.max_stack(), "max stack")?.serialize(writer)?;
        u16_length(self.top(), "stack top")?.serialize(writer)?;
        for slot_type in self.kinds() {
            slot_type.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for FrameDescriptor {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let max_locals = u16::deserialize(reader)? as usize;
        let max_stack = u16::deserialize(reader)? as usize;
        let top = u16::deserialize(reader)? as usize;
        if top > max_stack {
            let msg = format!("stack top {} past max stack {}", top, max_stack);
            return Err(Error::BadDescriptor(msg));
        }

        let kinds = (0..1 + max_locals + max_stack)
            .map(|_| SlotType::deserialize(reader))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if kinds[0] != SlotType::Int {
            let msg = format!("slot 0 holds {}, not int", kinds[0]);
            return Err(Error::BadDescriptor(msg));
        }
        Ok(FrameDescriptor::from_layout(kinds, max_locals, top))
    }
}
