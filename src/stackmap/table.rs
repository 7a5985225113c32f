use super::{Error, StackMapFrame, VerificationType};
use crate::class_graph::RuntimeClass;
use crate::descriptors::MethodDescriptor;
use crate::frame::{self, FrameBuilder, FrameDescriptor, SlotType};
use crate::names::BinaryName;
use crate::serialize::{u16_length, Deserialize, Serialize};
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Frames of one method, reconstructed from its stack map table
///
/// The table starts from the entry frame of the method (`this` and the parameters in the first
/// locals, empty stack) and records one frame per bytecode offset described by the stack map.
/// Once every path into those offsets has been merged in, [`FrameTable::descriptors`] freezes
/// them for the interpreter.
pub struct FrameTable {
    this_class: BinaryName,
    entry: FrameBuilder,

    /// Highest physical local position used by the entry frame
    entry_last_local: isize,

    /// Class instantiated by the `new` instruction at each offset
    new_sites: HashMap<u16, BinaryName>,

    recorded: BTreeMap<u32, FrameBuilder>,
}

impl FrameTable {
    pub fn new(
        this_class: BinaryName,
        descriptor: &MethodDescriptor,
        is_static: bool,
        max_locals: usize,
        max_stack: usize,
    ) -> Result<FrameTable, Error> {
        let parameter_length = descriptor.parameter_length(!is_static);
        if parameter_length > max_locals {
            return Err(Error::InvalidTable {
                bci: 0,
                message: format!(
                    "parameters need {} locals, but the method only has {}",
                    parameter_length, max_locals
                ),
            });
        }

        let mut entry = FrameBuilder::new(max_locals, max_stack);
        let mut slot = 0;
        if !is_static {
            entry.put_local(slot, SlotType::Object(this_class.clone()));
            slot += 1;
        }
        for parameter in &descriptor.parameters {
            let slot_type = SlotType::from(parameter);
            let width = slot_type.width();
            entry.put_local(slot, slot_type);
            slot += width;
        }

        Ok(FrameTable {
            this_class,
            entry,
            entry_last_local: parameter_length as isize - 1,
            new_sites: HashMap::new(),
            recorded: BTreeMap::new(),
        })
    }

    /// Frame on entry to the method
    pub fn entry(&self) -> &FrameBuilder {
        &self.entry
    }

    /// Remember which class the `new` at `offset` instantiates
    pub fn register_new_site(&mut self, offset: u16, class: BinaryName) {
        self.new_sites.insert(offset, class);
    }

    /// Slot type for a verification type
    ///
    /// Objects still waiting for their constructor are typed with the class they will have once
    /// initialized.
    pub fn slot_type(&self, verification_type: &VerificationType<BinaryName>) -> SlotType {
        match verification_type {
            VerificationType::Top => SlotType::Illegal,
            VerificationType::Integer => SlotType::Int,
            VerificationType::Float => SlotType::Float,
            VerificationType::Double => SlotType::Double,
            VerificationType::Long => SlotType::Long,
            VerificationType::Null => SlotType::Null,
            VerificationType::UninitializedThis => SlotType::Object(self.this_class.clone()),
            VerificationType::Object(cls) => SlotType::Object(cls.clone()),
            VerificationType::Uninitialized(offset) => match self.new_sites.get(offset) {
                Some(cls) => SlotType::Object(cls.clone()),
                None => {
                    log::warn!("No `new` known at offset {}, slot becomes unusable", offset);
                    SlotType::Illegal
                }
            },
        }
    }

    /// Record the frame of every entry of a stack map table
    pub fn replay(&mut self, frames: &[StackMapFrame<BinaryName>]) -> Result<(), Error> {
        let mut previous = self.entry.copy();
        let mut last_local = self.entry_last_local;
        let mut previous_bci: Option<u32> = None;

        for frame in frames {
            let offset_delta = frame.offset_delta() as u32;
            let bci = match previous_bci {
                None => offset_delta,
                Some(previous_bci) => previous_bci
                    .checked_add(offset_delta + 1)
                    .ok_or_else(|| Error::InvalidTable {
                        bci: previous_bci,
                        message: String::from("bytecode offset overflows"),
                    })?,
            };
            let (next, next_last_local) = self.derive(&previous, last_local, frame, bci)?;
            self.record(bci, next.copy())?;

            previous = next;
            last_local = next_last_local;
            previous_bci = Some(bci);
        }
        log::debug!("Replayed {} stack map frames", frames.len());
        Ok(())
    }

    /// Frame described by a stack map entry, along with the new highest local position
    fn derive(
        &self,
        previous: &FrameBuilder,
        last_local: isize,
        frame: &StackMapFrame<BinaryName>,
        bci: u32,
    ) -> Result<(FrameBuilder, isize), Error> {
        let invalid = |message: String| Error::InvalidTable { bci, message };

        match frame {
            StackMapFrame::SameLocalsNoStack { .. } => Ok((previous.same_no_stack(), last_local)),

            StackMapFrame::SameLocalsOneStack { stack, .. } => {
                let item = self.stack_item(stack, previous.max_stack(), 0, bci)?;
                Ok((previous.same_locals_one_stack(item), last_local))
            }

            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => {
                let chop = *chopped_k as usize;
                if !chop_fits(previous, chop, last_local) {
                    return Err(invalid(format!("cannot chop {} locals", chop)));
                }
                let (new_frame, delta) = previous.chop(chop, last_local);
                Ok((new_frame, last_local + delta))
            }

            StackMapFrame::AppendLocalsNoStack { locals, .. } => {
                let locals: Vec<SlotType> = locals.iter().map(|typ| self.slot_type(typ)).collect();
                let needed: usize = locals.iter().map(Width::width).sum();
                if (last_local + 1) as usize + needed > previous.max_locals() {
                    return Err(invalid(format!("no room to append {} locals", locals.len())));
                }
                let (new_frame, delta) = previous.append(&locals, last_local);
                Ok((new_frame, last_local + delta))
            }

            StackMapFrame::Full { locals, stack, .. } => {
                let mut new_frame = FrameBuilder::new(previous.max_locals(), previous.max_stack());
                let mut slot = 0;
                for local in locals {
                    let slot_type = self.slot_type(local);
                    let width = slot_type.width();
                    if slot + width > new_frame.max_locals() {
                        return Err(invalid(String::from("too many locals")));
                    }
                    new_frame.put_local(slot, slot_type);
                    slot += width;
                }
                for item in stack {
                    let item = self.stack_item(item, new_frame.max_stack(), new_frame.top(), bci)?;
                    new_frame.push(item);
                }
                Ok((new_frame, slot as isize - 1))
            }
        }
    }

    /// Slot type of an item pushed on a stack of height `top`
    fn stack_item(
        &self,
        item: &VerificationType<BinaryName>,
        max_stack: usize,
        top: usize,
        bci: u32,
    ) -> Result<SlotType, Error> {
        let slot_type = self.slot_type(item);
        if slot_type.is_illegal() {
            return Err(Error::InvalidTable {
                bci,
                message: format!("unusable stack item {}", item),
            });
        }
        if top + slot_type.width() > max_stack {
            return Err(Error::InvalidTable {
                bci,
                message: String::from("stack overflow"),
            });
        }
        Ok(slot_type)
    }

    /// Record the frame at some bytecode offset
    pub fn record(&mut self, bci: u32, mut builder: FrameBuilder) -> Result<&FrameBuilder, Error> {
        if builder.kinds().len() != self.entry.kinds().len()
            || builder.max_locals() != self.entry.max_locals()
        {
            return Err(Error::InvalidTable {
                bci,
                message: String::from("frame layout does not match the method"),
            });
        }
        match self.recorded.entry(bci) {
            Entry::Occupied(_) => Err(Error::InvalidTable {
                bci,
                message: String::from("frame already recorded"),
            }),
            Entry::Vacant(vacant) => {
                builder.set_bci(bci);
                log::debug!("Recorded frame at {}", bci);
                Ok(vacant.insert(builder))
            }
        }
    }

    pub fn recorded(&self, bci: u32) -> Option<&FrameBuilder> {
        self.recorded.get(&bci)
    }

    /// Recorded frames, by increasing bytecode offset
    pub fn frames(&self) -> impl Iterator<Item = (u32, &FrameBuilder)> {
        self.recorded.iter().map(|(bci, frame)| (*bci, frame))
    }

    /// Merge a state flowing into `bci` with the frame recorded there
    ///
    /// Returns whether the recorded frame changed, by widening or by slots downgraded to `Illegal`
    /// (in which case its successors need to be visited again). With `trust_recorded`, classes in the recorded frame are taken as already
    /// precise enough (which is the case for frames from a stack map table).
    pub fn merge_at<K, F>(
        &mut self,
        bci: u32,
        incoming: &FrameBuilder,
        trust_recorded: bool,
        resolve: F,
    ) -> Result<bool, Error>
    where
        K: RuntimeClass,
        F: FnMut(&BinaryName) -> Option<K>,
    {
        let recorded = self.recorded.get_mut(&bci).ok_or_else(|| Error::InvalidTable {
            bci,
            message: String::from("no frame recorded"),
        })?;
        if !incoming.same_top(recorded) {
            return Err(Error::InvalidTable {
                bci,
                message: format!(
                    "stack height {} does not match recorded height {}",
                    incoming.top(),
                    recorded.top()
                ),
            });
        }

        let before = recorded.kinds().to_vec();
        let merged = match incoming.merge_into(recorded, bci, trust_recorded, resolve)? {
            Cow::Borrowed(_) => None,
            Cow::Owned(merged) => Some(merged),
        };
        match merged {
            // Slots may still have been downgraded to `Illegal` in place
            None => {
                let downgraded = recorded.kinds() != before.as_slice();
                if downgraded {
                    log::debug!("Frame at {} lost slots after merge", bci);
                }
                Ok(downgraded)
            }
            Some(mut merged) => {
                log::debug!("Frame at {} changed after merge", bci);
                merged.set_bci(bci);
                *recorded = merged;
                Ok(true)
            }
        }
    }

    /// Freeze every recorded frame
    pub fn descriptors(&self) -> BTreeMap<u32, Arc<FrameDescriptor>> {
        self.recorded
            .iter()
            .map(|(bci, frame)| (*bci, Arc::new(frame.build())))
            .collect()
    }

    /// Write the descriptors of every recorded frame (`u16` count, then offset and descriptor)
    pub fn write_descriptors<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        u16_length(self.recorded.len(), "frame count")?.serialize(writer)?;
        for (bci, frame) in &self.recorded {
            bci.serialize(writer)?;
            frame.build().serialize(writer)?;
        }
        Ok(())
    }
}

/// Read back descriptors written by [`FrameTable::write_descriptors`]
pub fn read_descriptors<R: ReadBytesExt>(
    reader: &mut R,
) -> Result<BTreeMap<u32, Arc<FrameDescriptor>>, frame::Error> {
    let count = u16::deserialize(reader)?;
    let mut descriptors = BTreeMap::new();
    for _ in 0..count {
        let bci = u32::deserialize(reader)?;
        let descriptor = FrameDescriptor::deserialize(reader)?;
        descriptors.insert(bci, Arc::new(descriptor));
    }
    Ok(descriptors)
}

/// Are there at least `chop` locals at or below `last_local`?
fn chop_fits(frame: &FrameBuilder, chop: usize, last_local: isize) -> bool {
    let mut pos = last_local;
    for _ in 0..chop {
        if pos < 0 {
            return false;
        }
        pos -= 1;
        if pos >= 0 && frame.get_local(pos as usize).kind().needs_two_slots() {
            pos -= 1;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_graph::{ClassAccessFlags, ClassData, ClassGraph, ClassGraphArenas, LoaderId};
    use std::io::Cursor;

    fn name(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn table(descriptor: &str, is_static: bool, max_locals: usize, max_stack: usize) -> FrameTable {
        let descriptor = MethodDescriptor::parse(descriptor).unwrap();
        FrameTable::new(name("app/Main"), &descriptor, is_static, max_locals, max_stack).unwrap()
    }

    #[test]
    fn entry_frame() {
        let table = table("(ILjava/lang/String;J)V", false, 6, 0);
        let entry = table.entry();
        assert_eq!(entry.get_local(0), &SlotType::Object(name("app/Main")));
        assert_eq!(entry.get_local(1), &SlotType::Int);
        assert_eq!(entry.get_local(2), &SlotType::Object(BinaryName::STRING));
        assert_eq!(entry.get_local(3), &SlotType::Long);
        assert_eq!(entry.get_local(4), &SlotType::Illegal);
        assert_eq!(entry.get_local(5), &SlotType::Illegal);
        assert!(entry.is_working());

        let descriptor = MethodDescriptor::parse("(JJ)V").unwrap();
        assert!(FrameTable::new(name("app/Main"), &descriptor, true, 3, 0).is_err());
    }

    #[test]
    fn replay_frames() {
        let mut table = table("([Ljava/lang/String;)V", true, 5, 2);
        table.register_new_site(10, name("app/Shape"));
        let frames = vec![
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 4,
                locals: vec![VerificationType::Integer, VerificationType::Double],
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 2,
                stack: VerificationType::Uninitialized(10),
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 0,
                chopped_k: 1,
            },
            StackMapFrame::SameLocalsNoStack { offset_delta: 9 },
            StackMapFrame::Full {
                offset_delta: 1,
                locals: vec![VerificationType::Top, VerificationType::Long],
                stack: vec![VerificationType::Null],
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 0,
                locals: vec![VerificationType::Float],
            },
        ];
        table.replay(&frames).unwrap();

        let bcis: Vec<u32> = table.frames().map(|(bci, _)| bci).collect();
        assert_eq!(bcis, vec![4, 7, 8, 18, 20, 21]);

        let at_4 = table.recorded(4).unwrap();
        assert_eq!(at_4.bci(), Some(4));
        assert_eq!(at_4.get_local(1), &SlotType::Int);
        assert_eq!(at_4.get_local(2), &SlotType::Double);

        let at_7 = table.recorded(7).unwrap();
        assert_eq!(at_7.top(), 1);
        assert_eq!(at_7.kinds()[6], SlotType::Object(name("app/Shape")));

        let at_8 = table.recorded(8).unwrap();
        assert_eq!(at_8.top(), 0);
        assert_eq!(at_8.get_local(1), &SlotType::Int);
        assert_eq!(at_8.get_local(2), &SlotType::Illegal);

        let at_20 = table.recorded(20).unwrap();
        assert_eq!(at_20.get_local(0), &SlotType::Illegal);
        assert_eq!(at_20.get_local(1), &SlotType::Long);
        assert_eq!(at_20.kinds()[6], SlotType::Null);

        // A full frame resets the local count, including the leading `top`
        let at_21 = table.recorded(21).unwrap();
        assert_eq!(at_21.get_local(3), &SlotType::Float);
        assert_eq!(at_21.top(), 0);
    }

    #[test]
    fn invalid_frames() {
        let mut table = table("(I)V", true, 2, 1);
        let chop_too_much = [StackMapFrame::ChopLocalsNoStack {
            offset_delta: 3,
            chopped_k: 2,
        }];
        match table.replay(&chop_too_much) {
            Err(Error::InvalidTable { bci: 3, .. }) => (),
            other => panic!("Expected invalid table, got {:?}", other),
        }

        let append_too_much = [StackMapFrame::AppendLocalsNoStack {
            offset_delta: 3,
            locals: vec![VerificationType::Long],
        }];
        assert!(table.replay(&append_too_much).is_err());

        let push_too_much = [StackMapFrame::SameLocalsOneStack {
            offset_delta: 3,
            stack: VerificationType::Double,
        }];
        assert!(table.replay(&push_too_much).is_err());

        let unknown_new = [StackMapFrame::SameLocalsOneStack {
            offset_delta: 3,
            stack: VerificationType::Uninitialized(0),
        }];
        assert!(table.replay(&unknown_new).is_err());
        assert_eq!(table.frames().count(), 0);

        let same = [StackMapFrame::SameLocalsNoStack { offset_delta: 3 }];
        table.replay(&same).unwrap();
        assert!(table.replay(&same).is_err());
    }

    #[test]
    fn offsets_past_u32() {
        let mut table = table("()V", true, 0, 0);
        let frames = vec![
            StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::MAX
            };
            65_538
        ];
        match table.replay(&frames) {
            Err(Error::InvalidTable { bci, .. }) => assert_eq!(bci, u32::MAX),
            other => panic!("Expected invalid table, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn merge_incoming_states() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let shape = class_graph.add_class(ClassData::new(
            name("app/Shape"),
            java.object,
            ClassAccessFlags::class(),
            LoaderId::BOOTSTRAP,
        ));
        for circle in ["app/Circle", "app/Square"] {
            class_graph.add_class(ClassData::new(
                name(circle),
                shape,
                ClassAccessFlags::class(),
                LoaderId::BOOTSTRAP,
            ));
        }
        let resolve = |name: &BinaryName| class_graph.lookup(name, LoaderId::BOOTSTRAP);

        let mut table = table("()V", true, 2, 1);
        let mut at_5 = table.entry().copy();
        at_5.put_local(0, SlotType::Object(name("app/Circle")));
        at_5.put_local(1, SlotType::Int);
        table.record(5, at_5).unwrap();

        let mut incoming = table.entry().copy();
        incoming.put_local(0, SlotType::Object(name("app/Square")));
        incoming.put_local(1, SlotType::Int);
        assert!(table.merge_at(5, &incoming, false, resolve).unwrap());
        let at_5 = table.recorded(5).unwrap();
        assert_eq!(at_5.bci(), Some(5));
        assert_eq!(at_5.get_local(0), &SlotType::Object(name("app/Shape")));

        // Nothing left to widen
        assert!(!table.merge_at(5, &incoming, false, resolve).unwrap());

        // Dead locals in the incoming state are dead in the recorded one too
        let mut dead = incoming.copy();
        dead.clear(1);
        assert!(table.merge_at(5, &dead, false, resolve).unwrap());
        assert_eq!(table.recorded(5).unwrap().get_local(1), &SlotType::Illegal);
        assert!(!table.merge_at(5, &dead, false, resolve).unwrap());

        let mut deeper = incoming.copy();
        deeper.push(SlotType::Int);
        assert!(table.merge_at(5, &deeper, false, resolve).is_err());
        assert!(table.merge_at(6, &incoming, false, resolve).is_err());
    }

    #[test]
    fn persisted_descriptors() {
        let mut table = table("(D)V", false, 3, 2);
        let frames = [
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 0,
                stack: VerificationType::Object(BinaryName::STRING),
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 5,
                chopped_k: 1,
            },
        ];
        table.replay(&frames).unwrap();

        let descriptors = table.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[&0].stack(), &[SlotType::Object(BinaryName::STRING)]);
        assert_eq!(descriptors[&6].locals()[1], SlotType::Illegal);

        let mut bytes = vec![];
        table.write_descriptors(&mut bytes).unwrap();
        let read_back = read_descriptors(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read_back, descriptors);
    }
}
