use super::{ClassGraph, ClassId, Instance, LoaderId};
use crate::names::BinaryName;
use crate::util::RefId;
use std::collections::HashSet;

/// Loaded class, as seen by the frame merger and the resumption checks
pub trait RuntimeClass: Copy + Eq {
    fn name(&self) -> &BinaryName;

    /// Loader which defined this class
    fn defining_loader(&self) -> LoaderId;

    fn is_interface(&self) -> bool;

    /// Can a value of class `sub_type` be stored where `self` is expected?
    fn is_assignable_from(&self, sub_type: &Self) -> bool;

    /// Most specific class both `self` and `other` are assignable to
    ///
    /// Interfaces don't take part: if either class is an interface, the answer is the root class.
    fn least_common_ancestor(&self, other: &Self) -> Self;
}

/// Resolution of class names
pub trait ClassResolver {
    type Class: RuntimeClass;

    /// Resolve a name the way code inside `accessing` would see it (ie. through the defining
    /// loader of `accessing`)
    fn resolve(&self, name: &BinaryName, accessing: Self::Class) -> Option<Self::Class>;
}

/// Reference stored in a frame
pub trait RuntimeObject {
    type Class: RuntimeClass;

    /// Runtime class of the object
    fn class(&self) -> Self::Class;
}

impl<'g> RuntimeClass for ClassId<'g> {
    fn name(&self) -> &BinaryName {
        &self.0.name
    }

    fn defining_loader(&self) -> LoaderId {
        self.0.loader
    }

    fn is_interface(&self) -> bool {
        self.0.is_interface()
    }

    /// This does a traversal of super types of `sub_type` looking for `self`
    fn is_assignable_from(&self, sub_type: &Self) -> bool {
        let mut supertypes_to_visit: Vec<ClassId<'g>> = vec![*sub_type];
        let mut dont_revisit: HashSet<ClassId<'g>> = HashSet::new();
        dont_revisit.insert(*sub_type);

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !self.is_interface();

        while let Some(class_id) = supertypes_to_visit.pop() {
            if class_id == *self {
                return true;
            }
            let class_data = class_id.0;

            if let Some(superclass) = class_data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    let interface = RefId(interface);
                    if dont_revisit.insert(interface) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        false
    }

    fn least_common_ancestor(&self, other: &Self) -> Self {
        if self.is_interface() || other.is_interface() {
            return root_class(*self);
        }

        let mut ancestors: HashSet<ClassId<'g>> = HashSet::new();
        let mut next_class = Some(*self);
        while let Some(class_id) = next_class {
            ancestors.insert(class_id);
            next_class = class_id.0.superclass;
        }

        let mut next_class = Some(*other);
        while let Some(class_id) = next_class {
            if ancestors.contains(&class_id) {
                return class_id;
            }
            next_class = class_id.0.superclass;
        }

        // Disconnected hierarchies only happen with a malformed graph
        root_class(*self)
    }
}

/// Follow superclasses all the way up
fn root_class(class_id: ClassId<'_>) -> ClassId<'_> {
    let mut class_id = class_id;
    while let Some(superclass) = class_id.0.superclass {
        class_id = superclass;
    }
    class_id
}

impl<'g> ClassResolver for ClassGraph<'g> {
    type Class = ClassId<'g>;

    fn resolve(&self, name: &BinaryName, accessing: ClassId<'g>) -> Option<ClassId<'g>> {
        let resolved = self.lookup(name, accessing.defining_loader());
        if resolved.is_none() {
            log::debug!(
                "{:?} is not visible from {:?}",
                name,
                accessing.0
            );
        }
        resolved
    }
}

impl<'g> RuntimeObject for Instance<'g> {
    type Class = ClassId<'g>;

    fn class(&self) -> ClassId<'g> {
        self.class_id()
    }
}

#[cfg(test)]
mod test {
    use crate::class_graph::*;
    use crate::names::BinaryName;

    #[test]
    fn simple_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        assert!(
            java.object.is_assignable_from(&java.object),
            "java.lang.Object <: java.lang.Object"
        );
        assert!(
            java.object.is_assignable_from(&java.string),
            "java.lang.String <: java.lang.Object"
        );
        assert!(
            java.char_sequence.is_assignable_from(&java.string),
            "java.lang.String <: java.lang.CharSequence"
        );
        assert!(
            java.comparable.is_assignable_from(&java.integer),
            "java.lang.Integer <: java.lang.Comparable"
        );
        assert!(
            !java.string.is_assignable_from(&java.object),
            "java.lang.Object </: java.lang.String"
        );
        assert!(
            !java.number.is_assignable_from(&java.string),
            "java.lang.String </: java.lang.Number"
        );
    }

    #[test]
    fn least_common_ancestors() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        assert_eq!(java.integer.least_common_ancestor(&java.long), java.number);
        assert_eq!(java.long.least_common_ancestor(&java.integer), java.number);
        assert_eq!(java.integer.least_common_ancestor(&java.number), java.number);
        assert_eq!(java.string.least_common_ancestor(&java.integer), java.object);
        assert_eq!(
            java.runtime_exception.least_common_ancestor(&java.exception),
            java.exception
        );
        assert_eq!(
            java.string.least_common_ancestor(&java.char_sequence),
            java.object
        );
        assert_eq!(java.string.least_common_ancestor(&java.string), java.string);
    }

    #[test]
    fn resolve_through_accessing_loader() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();

        let app = LoaderId(7);
        class_graph.add_loader(app, LoaderId::BOOTSTRAP);
        let name = BinaryName::from_string(String::from("app/Main")).unwrap();
        let main = class_graph.add_class(ClassData::new(
            name.clone(),
            java.object,
            ClassAccessFlags::class(),
            app,
        ));

        assert_eq!(class_graph.resolve(&name, main), Some(main));
        assert_eq!(class_graph.resolve(&BinaryName::STRING, main), Some(java.string));
        assert_eq!(class_graph.resolve(&name, java.string), None);
    }
}
