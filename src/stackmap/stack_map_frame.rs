use super::VerificationType;
use crate::frame::Error;
use crate::serialize::{Deserialize, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// One entry of a `StackMapTable` attribute
///
/// Every entry describes the frame at some bytecode offset relative to the frame of the previous
/// entry (or to the entry frame of the method, for the first one). The offset of an entry is
/// `offset_delta` for the first entry and `previous + offset_delta + 1` after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame<Cls> {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationType<Cls>,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationType<Cls>>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType<Cls>>,
        stack: Vec<VerificationType<Cls>>,
    },
}

impl<Cls> StackMapFrame<Cls> {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    /// Resolve the classes mentioned in the frame (eg. from constant pool indices to names)
    pub fn try_map<Cls2, E>(
        &self,
        mut map_class: impl FnMut(&Cls) -> Result<Cls2, E>,
    ) -> Result<StackMapFrame<Cls2>, E> {
        let mut map_types = |types: &[VerificationType<Cls>]| {
            types
                .iter()
                .map(|typ| typ.try_map(&mut map_class))
                .collect::<Result<Vec<_>, E>>()
        };
        Ok(match self {
            StackMapFrame::SameLocalsNoStack { offset_delta } => StackMapFrame::SameLocalsNoStack {
                offset_delta: *offset_delta,
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => StackMapFrame::SameLocalsOneStack {
                offset_delta: *offset_delta,
                stack: stack.try_map(&mut map_class)?,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => StackMapFrame::ChopLocalsNoStack {
                offset_delta: *offset_delta,
                chopped_k: *chopped_k,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => StackMapFrame::AppendLocalsNoStack {
                offset_delta: *offset_delta,
                locals: map_types(locals)?,
            },
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => StackMapFrame::Full {
                offset_delta: *offset_delta,
                locals: map_types(locals)?,
                stack: map_types(stack)?,
            },
        })
    }
}

impl Serialize for StackMapFrame<u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                assert!(
                    0 < *chopped_k && *chopped_k < 4,
                    "ChopLocalsNoStack chops 1-3 locals"
                );
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                let added_k = locals.len();
                assert!(
                    0 < added_k && added_k < 4,
                    "AppendLocalsNoStack adds 1-3 locals"
                );
                (251 + added_k as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame<u16> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        Ok(match tag {
            0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: tag as u16,
            },
            64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: (tag - 64) as u16,
                stack: VerificationType::deserialize(reader)?,
            },
            247 => StackMapFrame::SameLocalsOneStack {
                offset_delta: u16::deserialize(reader)?,
                stack: VerificationType::deserialize(reader)?,
            },
            248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
                chopped_k: 251 - tag,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
            },
            252..=254 => {
                let offset_delta = u16::deserialize(reader)?;
                let locals = (0..tag - 251)
                    .map(|_| VerificationType::deserialize(reader))
                    .collect::<Result<Vec<_>, _>>()?;
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => StackMapFrame::Full {
                offset_delta: u16::deserialize(reader)?,
                locals: Vec::deserialize(reader)?,
                stack: Vec::deserialize(reader)?,
            },
            _ => return Err(Error::BadTag(tag)),
        })
    }
}

/// Read a whole `StackMapTable` attribute body (`u16` count, then the entries)
pub fn read_stack_map_table<R: ReadBytesExt>(
    reader: &mut R,
) -> Result<Vec<StackMapFrame<u16>>, Error> {
    Vec::deserialize(reader)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn encode(frame: &StackMapFrame<u16>) -> Vec<u8> {
        let mut bytes = vec![];
        frame.serialize(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn compact_encodings() {
        let same = StackMapFrame::SameLocalsNoStack { offset_delta: 12 };
        assert_eq!(encode(&same), vec![12]);

        let same_wide = StackMapFrame::SameLocalsNoStack { offset_delta: 300 };
        assert_eq!(encode(&same_wide), vec![251, 1, 44]);

        let one_stack = StackMapFrame::SameLocalsOneStack {
            offset_delta: 3,
            stack: VerificationType::Object(5),
        };
        assert_eq!(encode(&one_stack), vec![67, 7, 0, 5]);

        let chop = StackMapFrame::<u16>::ChopLocalsNoStack {
            offset_delta: 7,
            chopped_k: 2,
        };
        assert_eq!(encode(&chop), vec![249, 0, 7]);

        let append = StackMapFrame::AppendLocalsNoStack {
            offset_delta: 0,
            locals: vec![VerificationType::Integer, VerificationType::Long],
        };
        assert_eq!(encode(&append), vec![253, 0, 0, 1, 4]);
    }

    #[test]
    fn read_table() {
        let frames: Vec<StackMapFrame<u16>> = vec![
            StackMapFrame::Full {
                offset_delta: 4,
                locals: vec![VerificationType::UninitializedThis, VerificationType::Top],
                stack: vec![VerificationType::Uninitialized(1)],
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 100,
                stack: VerificationType::Double,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 2,
                chopped_k: 1,
            },
        ];
        let mut bytes = vec![];
        frames.serialize(&mut bytes).unwrap();
        assert_eq!(&bytes[..3], &[0, 3, 255]);

        let decoded = read_stack_map_table(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, frames);
    }

    #[test]
    fn reserved_tags() {
        let decoded = StackMapFrame::<u16>::deserialize(&mut Cursor::new([128u8]));
        assert!(matches!(decoded, Err(Error::BadTag(128))));
    }
}
