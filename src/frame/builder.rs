use super::{FrameDescriptor, SlotKind, SlotType};
use crate::descriptors::FieldType;
use crate::names::BinaryName;
use crate::util::Width;

/// Mutable frame layout, used while walking a method's control flow
///
/// A builder starts out _working_ (no bytecode index). Once the analysis reaches a program point
/// it wants to remember, the builder is _recorded_ there with [`FrameBuilder::set_bci`] and
/// becomes the reference state that other paths into the same point are merged into.
///
/// `long` and `double` values take two slots, but not in the same way in both regions:
///
///   - on the operand stack, the real type sits in the _higher_ slot and the slot below it is
///     `Illegal`
///   - in the locals, the real type sits at the local index and the following slot is `Illegal`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuilder {
    bci: Option<u32>,
    pub(super) kinds: Vec<SlotType>,
    max_locals: usize,
    top: usize,
}

impl FrameBuilder {
    /// Builder with every local and stack slot `Illegal`
    pub fn new(max_locals: usize, max_stack: usize) -> FrameBuilder {
        let mut kinds = vec![SlotType::Illegal; 1 + max_locals + max_stack];
        kinds[0] = SlotType::Int;
        FrameBuilder {
            bci: None,
            kinds,
            max_locals,
            top: 0,
        }
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn max_stack(&self) -> usize {
        self.kinds.len() - 1 - self.max_locals
    }

    /// Number of occupied stack slots
    pub fn top(&self) -> usize {
        self.top
    }

    /// All slot types, including the bookkeeping slot
    pub fn kinds(&self) -> &[SlotType] {
        &self.kinds
    }

    /// Push a value onto the operand stack
    pub fn push(&mut self, slot_type: SlotType) {
        assert!(!slot_type.is_illegal(), "cannot push an illegal value");
        if slot_type.kind().needs_two_slots() {
            self.push_slot(SlotType::Illegal);
        }
        self.push_slot(slot_type);
    }

    /// Push a value of a field type (sub-word types are pushed as `Int`)
    pub fn push_field_type(&mut self, field_type: &FieldType) {
        self.push(SlotType::from(field_type));
    }

    /// Push the result of a method call, if there is one
    pub fn push_return(&mut self, return_type: Option<&FieldType>) {
        if let Some(field_type) = return_type {
            self.push_field_type(field_type);
        }
    }

    fn push_slot(&mut self, slot_type: SlotType) {
        let idx = self.stack_idx(self.top);
        assert!(idx < self.kinds.len(), "operand stack overflow");
        self.kinds[idx] = slot_type;
        self.top += 1;
    }

    /// Pop the top stack slot
    ///
    /// For a two-slot value, this only removes the slot holding the type: the placeholder below
    /// stays on the stack (see [`FrameBuilder::pop_expecting`]).
    pub fn pop(&mut self) -> SlotType {
        assert!(self.top > 0, "operand stack underflow");
        let head = self.stack_idx(self.top - 1);
        let slot_type = std::mem::replace(&mut self.kinds[head], SlotType::Illegal);
        self.top -= 1;
        slot_type
    }

    /// Pop a value of the given kind, including the placeholder of two-slot values
    pub fn pop_expecting(&mut self, kind: SlotKind) -> SlotType {
        let slot_type = self.pop();
        assert_eq!(slot_type.kind(), kind, "unexpected kind on top of the stack");
        if kind.needs_two_slots() {
            let placeholder = self.pop();
            assert!(placeholder.is_illegal(), "two-slot value without placeholder");
        }
        slot_type
    }

    /// Discard the top two stack slots, whatever they hold
    pub fn pop2(&mut self) {
        self.pop();
        self.pop();
    }

    pub fn bci(&self) -> Option<u32> {
        self.bci
    }

    pub fn set_bci(&mut self, bci: u32) {
        self.bci = Some(bci);
    }

    /// Is this builder still being built?
    pub fn is_working(&self) -> bool {
        self.bci.is_none()
    }

    /// Has this builder been recorded at a bytecode index?
    pub fn is_record(&self) -> bool {
        self.bci.is_some()
    }

    pub fn put_local(&mut self, slot: usize, slot_type: SlotType) {
        let width = slot_type.width();
        assert!(
            slot + width <= self.max_locals,
            "local {} of width {} out of range",
            slot,
            width
        );
        let idx = local_idx(slot);
        self.kinds[idx] = slot_type;
        if width == 2 {
            self.kinds[idx + 1] = SlotType::Illegal;
        }
    }

    pub fn get_local(&self, slot: usize) -> &SlotType {
        assert!(slot < self.max_locals, "local {} out of range", slot);
        &self.kinds[local_idx(slot)]
    }

    pub fn clear(&mut self, slot: usize) {
        self.put_local(slot, SlotType::Illegal);
    }

    /// Working copy of this builder (the copy is not recorded anywhere)
    pub fn copy(&self) -> FrameBuilder {
        FrameBuilder {
            bci: None,
            kinds: self.kinds.clone(),
            max_locals: self.max_locals,
            top: self.top,
        }
    }

    /// Freeze the current layout
    pub fn build(&self) -> FrameDescriptor {
        FrameDescriptor::from_layout(self.kinds.clone(), self.max_locals, self.top)
    }

    pub fn clear_stack(&mut self) -> &mut FrameBuilder {
        let start = self.stack_idx(0);
        let end = self.stack_idx(self.top);
        for slot_type in &mut self.kinds[start..end] {
            *slot_type = SlotType::Illegal;
        }
        self.top = 0;
        self
    }

    /// Do both builders have the same layout and the same stack height?
    pub fn same_top(&self, that: &FrameBuilder) -> bool {
        self.kinds.len() == that.kinds.len() && self.top == that.top
    }

    /// Highest physical local position in use, or `-1` if there are no locals
    ///
    /// A two-slot local at the end counts its second position too.
    pub fn last_local(&self) -> isize {
        let locals = &self.kinds[1..1 + self.max_locals];
        match locals.iter().rposition(|slot_type| !slot_type.is_illegal()) {
            None => -1,
            Some(pos) => (pos + locals[pos].width() - 1) as isize,
        }
    }

    /// Same locals, empty stack
    pub fn same_no_stack(&self) -> FrameBuilder {
        let mut new_frame = self.copy();
        new_frame.clear_stack();
        new_frame
    }

    /// Same locals, and a stack with exactly one value
    pub fn same_locals_one_stack(&self, stack_item: SlotType) -> FrameBuilder {
        let mut new_frame = self.same_no_stack();
        new_frame.push(stack_item);
        new_frame
    }

    /// Same locals minus the last `chop` ones, empty stack
    ///
    /// `last_local` is the highest physical local position in use. Returns the new frame and the
    /// (negative) change in physical local positions.
    pub fn chop(&self, chop: usize, last_local: isize) -> (FrameBuilder, isize) {
        let mut new_frame = self.same_no_stack();
        let mut pos = last_local;
        for _ in 0..chop {
            assert!(pos >= 0, "chopping more locals than there are");
            new_frame.clear(pos as usize);
            pos -= 1;
            if pos >= 0 && new_frame.get_local(pos as usize).kind().needs_two_slots() {
                new_frame.clear(pos as usize);
                pos -= 1;
            }
        }
        (new_frame, pos - last_local)
    }

    /// Same locals plus some new ones after `last_local`, empty stack
    ///
    /// Returns the new frame and the change in physical local positions.
    pub fn append(&self, locals: &[SlotType], last_local: isize) -> (FrameBuilder, isize) {
        let mut new_frame = self.same_no_stack();
        let mut pos = last_local;
        for slot_type in locals {
            pos += 1;
            new_frame.put_local(pos as usize, slot_type.clone());
            if slot_type.kind().needs_two_slots() {
                pos += 1;
            }
        }
        (new_frame, pos - last_local)
    }

    fn stack_idx(&self, slot: usize) -> usize {
        1 + self.max_locals + slot
    }
}

fn local_idx(slot: usize) -> usize {
    1 + slot
}
