use super::{Activation, Error, Snapshot, SlotType};
use std::fmt;

/// Static layout of an interpreter frame at one bytecode index
///
/// The slots are laid out as follows:
///
///   - slot 0 is a bookkeeping slot, always `Int`
///   - the next `max_locals` slots are the local variables
///   - the rest is the operand stack, of which the first `top` slots are occupied
///
/// A descriptor is immutable once built. It is shared by every activation that stops at its
/// bytecode index and is what makes it possible to move an activation in and out of a flat
/// [`Snapshot`] with the right typed accessors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    kinds: Box<[SlotType]>,
    max_locals: usize,
    top: usize,
}

impl FrameDescriptor {
    pub fn new(stack_kinds: &[SlotType], local_kinds: &[SlotType], top: usize) -> FrameDescriptor {
        assert!(top <= stack_kinds.len(), "stack top past the end of the stack");
        let mut kinds = Vec::with_capacity(1 + local_kinds.len() + stack_kinds.len());
        kinds.push(SlotType::Int);
        kinds.extend_from_slice(local_kinds);
        kinds.extend_from_slice(stack_kinds);
        FrameDescriptor {
            kinds: kinds.into_boxed_slice(),
            max_locals: local_kinds.len(),
            top,
        }
    }

    pub(crate) fn from_layout(kinds: Vec<SlotType>, max_locals: usize, top: usize) -> Self {
        debug_assert!(kinds.first() == Some(&SlotType::Int));
        debug_assert!(1 + max_locals + top <= kinds.len());
        FrameDescriptor {
            kinds: kinds.into_boxed_slice(),
            max_locals,
            top,
        }
    }

    /// Total number of slots
    pub fn size(&self) -> usize {
        self.kinds.len()
    }

    /// Number of occupied stack slots
    pub fn top(&self) -> usize {
        self.top
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn max_stack(&self) -> usize {
        self.kinds.len() - 1 - self.max_locals
    }

    /// All slot types, including the bookkeeping slot
    pub fn kinds(&self) -> &[SlotType] {
        &self.kinds
    }

    pub fn locals(&self) -> &[SlotType] {
        &self.kinds[1..1 + self.max_locals]
    }

    /// Occupied part of the operand stack, bottom first
    pub fn stack(&self) -> &[SlotType] {
        let base = 1 + self.max_locals;
        &self.kinds[base..base + self.top]
    }

    /// Copy the slots of an activation into a new snapshot
    pub fn export<A: Activation>(&self, frame: &A) -> Result<Snapshot<A::Reference>, Error> {
        let mut snapshot = Snapshot::new(self.size());
        self.export_into(frame, &mut snapshot)?;
        Ok(snapshot)
    }

    /// Copy the slots of an activation into an existing snapshot
    ///
    /// Every reference of the snapshot is reset first, so that slots which are not references at
    /// this bytecode index never keep an object from a previous export alive.
    pub fn export_into<A: Activation>(
        &self,
        frame: &A,
        snapshot: &mut Snapshot<A::Reference>,
    ) -> Result<(), Error> {
        self.check_activation(frame)?;
        self.check_snapshot(snapshot)?;
        snapshot.clear_references();
        for slot in 0..self.kinds.len() {
            self.export_slot(frame, slot, snapshot);
        }
        log::trace!("Exported {} frame slots", self.kinds.len());
        Ok(())
    }

    /// Write the slots of a snapshot back into an activation
    ///
    /// Illegal slots are cleared in the activation. This does not check that the snapshot is
    /// well-typed: see [`FrameDescriptor::validate_import`] and [`FrameDescriptor::resume`].
    pub fn import<A: Activation>(
        &self,
        snapshot: &Snapshot<A::Reference>,
        frame: &mut A,
    ) -> Result<(), Error> {
        self.check_activation(frame)?;
        self.check_snapshot(snapshot)?;
        for slot in 0..self.kinds.len() {
            self.import_slot(frame, slot, snapshot);
        }
        log::trace!("Imported {} frame slots", self.kinds.len());
        Ok(())
    }

    fn export_slot<A: Activation>(
        &self,
        frame: &A,
        slot: usize,
        snapshot: &mut Snapshot<A::Reference>,
    ) {
        let primitives = &mut snapshot.primitives;
        match &self.kinds[slot] {
            SlotType::Int => primitives[slot] = zero_extend(frame.get_int(slot)),
            SlotType::Float => primitives[slot] = zero_extend(frame.get_float(slot).to_bits() as i32),
            SlotType::Long => primitives[slot] = frame.get_long(slot) as u64,
            SlotType::Double => primitives[slot] = frame.get_double(slot).to_bits(),
            SlotType::Null | SlotType::Object(_) => {
                snapshot.references[slot] = frame.get_reference(slot)
            }
            SlotType::Illegal => (),
        }
    }

    fn import_slot<A: Activation>(&self, frame: &mut A, slot: usize, snapshot: &Snapshot<A::Reference>) {
        let primitives = &snapshot.primitives;
        match &self.kinds[slot] {
            SlotType::Int => frame.set_int(slot, narrow(primitives[slot])),
            SlotType::Float => frame.set_float(slot, f32::from_bits(narrow(primitives[slot]) as u32)),
            SlotType::Long => frame.set_long(slot, primitives[slot] as i64),
            SlotType::Double => frame.set_double(slot, f64::from_bits(primitives[slot])),
            SlotType::Null | SlotType::Object(_) => {
                frame.set_reference(slot, snapshot.references[slot].clone())
            }
            SlotType::Illegal => frame.clear_slot(slot),
        }
    }

    fn check_activation<A: Activation>(&self, frame: &A) -> Result<(), Error> {
        check_len("activation", self.kinds.len(), frame.slot_count())
    }

    pub(crate) fn check_snapshot<R>(&self, snapshot: &Snapshot<R>) -> Result<(), Error> {
        check_len("pointers array", self.kinds.len(), snapshot.references.len())?;
        check_len("primitives array", self.kinds.len(), snapshot.primitives.len())
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::LayoutMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Renders as `locals [..] stack [..]`, leaving out the bookkeeping slot
impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, slots: &[SlotType]) -> fmt::Result {
            f.write_str("[")?;
            for (idx, slot) in slots.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", slot)?;
            }
            f.write_str("]")
        }
        f.write_str("locals ")?;
        list(f, self.locals())?;
        f.write_str(" stack ")?;
        list(f, self.stack())
    }
}

/// Widen a 32-bit value without sign extension
pub(crate) fn zero_extend(value: i32) -> u64 {
    value as u32 as u64
}

/// Keep the low 32 bits of a word
pub(crate) fn narrow(value: u64) -> i32 {
    value as i32
}
