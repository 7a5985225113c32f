use super::{Error, FrameBuilder, SlotType};
use crate::class_graph::RuntimeClass;
use crate::names::BinaryName;
use std::borrow::Cow;

impl FrameBuilder {
    /// Merge this state into the state `that` recorded at a join point
    ///
    /// Each slot of the result is the most precise type compatible with both states:
    ///
    ///   - a slot which is `Illegal` in `that` stays `Illegal`
    ///   - a slot which is `Illegal` in `self` becomes `Illegal` in `that`, in place
    ///   - primitive slots must match exactly, otherwise they become `Illegal`
    ///   - unless `trust_that` is set, two different classes widen to their least common
    ///     ancestor (classes are looked up with `resolve`)
    ///
    /// Apart from the in-place downgrades, `that` is never modified. If some slot needs to change
    /// the result is a fresh working copy of `that`, and otherwise it is `that` itself.
    ///
    /// Panics if the two states have different layouts or stack heights, or if `that` is not
    /// recorded at `merge_bci`.
    pub fn merge_into<'t, K, F>(
        &self,
        that: &'t mut FrameBuilder,
        merge_bci: u32,
        trust_that: bool,
        mut resolve: F,
    ) -> Result<Cow<'t, FrameBuilder>, Error>
    where
        K: RuntimeClass,
        F: FnMut(&BinaryName) -> Option<K>,
    {
        assert_eq!(
            that.bci(),
            Some(merge_bci),
            "merging into a frame not recorded at the merge point"
        );
        assert!(
            self.same_top(that),
            "merging frames with different layouts at {}",
            merge_bci
        );

        let mut merged: Option<FrameBuilder> = None;
        for slot in 0..self.kinds.len() {
            let this_type = &self.kinds[slot];
            let that_type = &that.kinds[slot];

            if that_type.is_illegal() {
                continue;
            }

            if this_type.is_illegal() {
                that.kinds[slot] = SlotType::Illegal;
                if let Some(merged) = merged.as_mut() {
                    merged.kinds[slot] = SlotType::Illegal;
                }
                continue;
            }

            if this_type.is_primitive() || that_type.is_primitive() {
                if this_type != that_type {
                    diverge(&mut merged, that, slot, SlotType::Illegal);
                }
                continue;
            }

            if trust_that {
                continue;
            }
            if let (SlotType::Object(this_class), SlotType::Object(that_class)) =
                (this_type, that_type)
            {
                if this_class == that_class {
                    continue;
                }
                let this_resolved =
                    resolve(this_class).ok_or_else(|| Error::UnresolvedType(this_class.clone()))?;
                let that_resolved =
                    resolve(that_class).ok_or_else(|| Error::UnresolvedType(that_class.clone()))?;
                let ancestor = this_resolved.least_common_ancestor(&that_resolved);
                if ancestor.name() != that_class {
                    log::debug!(
                        "Widening slot {} at {} from {:?} to {:?}",
                        slot,
                        merge_bci,
                        that_class,
                        ancestor.name()
                    );
                    let widened = SlotType::Object(ancestor.name().clone());
                    diverge(&mut merged, that, slot, widened);
                }
            }
        }

        let that: &'t FrameBuilder = that;
        Ok(match merged {
            Some(merged) => Cow::Owned(merged),
            None => Cow::Borrowed(that),
        })
    }
}

/// Record a changed slot, copying `that` on the first change
fn diverge(
    merged: &mut Option<FrameBuilder>,
    that: &FrameBuilder,
    slot: usize,
    slot_type: SlotType,
) {
    let merged = merged.get_or_insert_with(|| that.copy());
    merged.kinds[slot] = slot_type;
}
