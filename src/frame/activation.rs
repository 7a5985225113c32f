use std::fmt::Debug;

/// Native storage of one interpreter activation (locals and operand stack)
///
/// Slots are addressed the same way as in a [`super::FrameDescriptor`]: slot 0 is the bookkeeping
/// slot, then the locals, then the operand stack. Reading a slot with an accessor for a kind it
/// does not hold is a bug in the caller.
pub trait Activation {
    /// Reference values stored in the activation
    type Reference: Clone;

    /// Total number of slots
    fn slot_count(&self) -> usize;

    fn get_int(&self, slot: usize) -> i32;
    fn set_int(&mut self, slot: usize, value: i32);

    fn get_float(&self, slot: usize) -> f32;
    fn set_float(&mut self, slot: usize, value: f32);

    fn get_long(&self, slot: usize) -> i64;
    fn set_long(&mut self, slot: usize, value: i64);

    fn get_double(&self, slot: usize) -> f64;
    fn set_double(&mut self, slot: usize, value: f64);

    /// `None` is the null reference
    fn get_reference(&self, slot: usize) -> Option<Self::Reference>;
    fn set_reference(&mut self, slot: usize, value: Option<Self::Reference>);

    /// Mark a slot as holding nothing
    fn clear_slot(&mut self, slot: usize);
}

/// Contents of one slot of an [`InterpreterFrame`]
#[derive(Clone, Debug)]
pub enum Slot<R> {
    Empty,
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Reference(Option<R>),
}

/// Floats compare by bit pattern, so that a `NaN` payload or `-0.0` surviving a round trip is
/// observable
impl<R: PartialEq> PartialEq for Slot<R> {
    fn eq(&self, other: &Slot<R>) -> bool {
        match (self, other) {
            (Slot::Empty, Slot::Empty) => true,
            (Slot::Int(i1), Slot::Int(i2)) => i1 == i2,
            (Slot::Float(f1), Slot::Float(f2)) => f1.to_bits() == f2.to_bits(),
            (Slot::Long(l1), Slot::Long(l2)) => l1 == l2,
            (Slot::Double(d1), Slot::Double(d2)) => d1.to_bits() == d2.to_bits(),
            (Slot::Reference(r1), Slot::Reference(r2)) => r1 == r2,
            _ => false,
        }
    }
}

/// Activation with tagged slots
///
/// Every slot remembers what kind of value was last written to it, and the typed getters check
/// that tag.
#[derive(Clone, Debug, PartialEq)]
pub struct InterpreterFrame<R> {
    slots: Vec<Slot<R>>,
}

impl<R: Clone + Debug> InterpreterFrame<R> {
    /// Frame with every slot empty
    pub fn new(slot_count: usize) -> InterpreterFrame<R> {
        InterpreterFrame {
            slots: vec![Slot::Empty; slot_count],
        }
    }

    pub fn slots(&self) -> &[Slot<R>] {
        &self.slots
    }

    pub fn slot(&self, slot: usize) -> &Slot<R> {
        &self.slots[slot]
    }

    fn wrong_kind(&self, slot: usize, expected: &str) -> ! {
        panic!(
            "Frame slot {} holds {:?}, not {}",
            slot, self.slots[slot], expected
        )
    }
}

impl<R: Clone + Debug> Activation for InterpreterFrame<R> {
    type Reference = R;

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn get_int(&self, slot: usize) -> i32 {
        match self.slots[slot] {
            Slot::Int(value) => value,
            _ => self.wrong_kind(slot, "an int"),
        }
    }

    fn set_int(&mut self, slot: usize, value: i32) {
        self.slots[slot] = Slot::Int(value);
    }

    fn get_float(&self, slot: usize) -> f32 {
        match self.slots[slot] {
            Slot::Float(value) => value,
            _ => self.wrong_kind(slot, "a float"),
        }
    }

    fn set_float(&mut self, slot: usize, value: f32) {
        self.slots[slot] = Slot::Float(value);
    }

    fn get_long(&self, slot: usize) -> i64 {
        match self.slots[slot] {
            Slot::Long(value) => value,
            _ => self.wrong_kind(slot, "a long"),
        }
    }

    fn set_long(&mut self, slot: usize, value: i64) {
        self.slots[slot] = Slot::Long(value);
    }

    fn get_double(&self, slot: usize) -> f64 {
        match self.slots[slot] {
            Slot::Double(value) => value,
            _ => self.wrong_kind(slot, "a double"),
        }
    }

    fn set_double(&mut self, slot: usize, value: f64) {
        self.slots[slot] = Slot::Double(value);
    }

    fn get_reference(&self, slot: usize) -> Option<R> {
        match &self.slots[slot] {
            Slot::Reference(value) => value.clone(),
            _ => self.wrong_kind(slot, "a reference"),
        }
    }

    fn set_reference(&mut self, slot: usize, value: Option<R>) {
        self.slots[slot] = Slot::Reference(value);
    }

    fn clear_slot(&mut self, slot: usize) {
        self.slots[slot] = Slot::Empty;
    }
}
