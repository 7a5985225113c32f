use super::{Activation, Error, FrameDescriptor, Snapshot, SlotType};
use crate::class_graph::{ClassResolver, RuntimeClass, RuntimeObject};
use crate::names::BinaryName;

/// Knobs for [`FrameDescriptor::validate_import_with`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResumeChecks {
    same_loader_fast_path: bool,
}

impl Default for ResumeChecks {
    fn default() -> ResumeChecks {
        ResumeChecks {
            same_loader_fast_path: true,
        }
    }
}

impl ResumeChecks {
    /// Always resolve declared classes, even when the object's class obviously matches
    pub fn strict() -> ResumeChecks {
        ResumeChecks {
            same_loader_fast_path: false,
        }
    }

    /// Accept an object without resolution when its class has exactly the declared name and the
    /// same defining loader as the accessing class
    ///
    /// This relies on a loader never defining two classes with the same name.
    pub fn same_loader_fast_path(self, enabled: bool) -> ResumeChecks {
        ResumeChecks {
            same_loader_fast_path: enabled,
        }
    }

    pub fn uses_same_loader_fast_path(&self) -> bool {
        self.same_loader_fast_path
    }
}

impl FrameDescriptor {
    /// Check that a snapshot can be imported into an activation of a method in `accessing`
    ///
    /// See [`FrameDescriptor::validate_import_with`].
    pub fn validate_import<O, R>(
        &self,
        snapshot: &Snapshot<O>,
        accessing: R::Class,
        resolver: &R,
    ) -> Result<(), Error>
    where
        O: RuntimeObject<Class = R::Class>,
        R: ClassResolver,
    {
        self.validate_import_with(snapshot, accessing, resolver, ResumeChecks::default())
    }

    /// Check that a snapshot can be imported into an activation of a method in `accessing`
    ///
    /// This checks that:
    ///
    ///   - the snapshot has the layout of this descriptor
    ///   - primitive slots have no reference, and reference slots have a zero word
    ///   - slots typed `Null` really hold null
    ///   - every object is an instance of the declared class of its slot, as seen from
    ///     `accessing` (slots declared with an interface type accept any object)
    ///
    /// A snapshot may have been captured by code which sees different classes than `accessing`,
    /// so this must pass before the snapshot is imported.
    pub fn validate_import_with<O, R>(
        &self,
        snapshot: &Snapshot<O>,
        accessing: R::Class,
        resolver: &R,
        checks: ResumeChecks,
    ) -> Result<(), Error>
    where
        O: RuntimeObject<Class = R::Class>,
        R: ClassResolver,
    {
        self.check_snapshot(snapshot)?;
        for (slot, slot_type) in self.kinds().iter().enumerate() {
            let reference = &snapshot.references[slot];
            if slot_type.is_primitive() && reference.is_some() {
                return Err(Error::InvalidSnapshotShape {
                    slot,
                    expected: slot_type.clone(),
                });
            }
            if slot_type.is_reference() && snapshot.primitives[slot] != 0 {
                return Err(Error::InvalidSnapshotShape {
                    slot,
                    expected: slot_type.clone(),
                });
            }
            // Code at this index may pass a null-typed value anywhere a reference is expected
            if *slot_type == SlotType::Null && reference.is_some() {
                return Err(Error::InvalidSnapshotShape {
                    slot,
                    expected: SlotType::Null,
                });
            }
            if let (SlotType::Object(declared), Some(object)) = (slot_type, reference) {
                check_object_class(slot, declared, object.class(), accessing, resolver, checks)?;
            }
        }
        Ok(())
    }

    /// Validate a snapshot and write it into an activation
    ///
    /// The activation is left untouched if validation fails.
    pub fn resume<A, R>(
        &self,
        snapshot: &Snapshot<A::Reference>,
        frame: &mut A,
        accessing: R::Class,
        resolver: &R,
        checks: ResumeChecks,
    ) -> Result<(), Error>
    where
        A: Activation,
        A::Reference: RuntimeObject<Class = R::Class>,
        R: ClassResolver,
    {
        if let Err(err) = self.validate_import_with(snapshot, accessing, resolver, checks) {
            log::warn!("Rejected resumption in {:?}: {}", accessing.name(), err);
            return Err(err);
        }
        self.import(snapshot, frame)
    }
}

fn check_object_class<R: ClassResolver>(
    slot: usize,
    declared: &BinaryName,
    object_class: R::Class,
    accessing: R::Class,
    resolver: &R,
    checks: ResumeChecks,
) -> Result<(), Error> {
    let target = if declared == accessing.name() {
        // Hidden classes can't be found by name
        accessing
    } else {
        if checks.same_loader_fast_path
            && declared == object_class.name()
            && accessing.defining_loader() == object_class.defining_loader()
        {
            return Ok(());
        }
        resolver
            .resolve(declared, accessing)
            .ok_or_else(|| Error::UnresolvedType(declared.clone()))?
    };

    // Interfaces are erased
    if target.is_interface() || target.is_assignable_from(&object_class) {
        Ok(())
    } else {
        Err(Error::IllegalResumeType {
            slot,
            expected: target.name().clone(),
            actual: object_class.name().clone(),
        })
    }
}
