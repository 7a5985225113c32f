/// Flat copy of an activation's slots
///
/// The two vectors are index-aligned with the [`super::FrameDescriptor`] which produced them:
/// references go in `references` (with `None` as the null marker), everything else is a raw
/// 64-bit word in `primitives`. A snapshot is only meaningful together with that descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<R> {
    pub references: Vec<Option<R>>,
    pub primitives: Vec<u64>,
}

impl<R: Clone> Snapshot<R> {
    /// Snapshot of the right size for a descriptor with `len` slots, with every slot zeroed
    pub fn new(len: usize) -> Snapshot<R> {
        Snapshot {
            references: vec![None; len],
            primitives: vec![0; len],
        }
    }
}

impl<R> Snapshot<R> {
    pub fn from_parts(references: Vec<Option<R>>, primitives: Vec<u64>) -> Snapshot<R> {
        Snapshot {
            references,
            primitives,
        }
    }

    pub fn into_parts(self) -> (Vec<Option<R>>, Vec<u64>) {
        (self.references, self.primitives)
    }

    /// Reset every reference to null
    pub(crate) fn clear_references(&mut self) {
        for reference in self.references.iter_mut() {
            *reference = None;
        }
    }
}
