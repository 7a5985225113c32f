//! In-memory class hierarchy
//!
//! Frame merging and resumption checks both need to ask questions about classes: what is the
//! least common ancestor of two classes, is one class assignable to another, which class does a
//! name resolve to from some accessing class. Those questions go through the traits in
//! [`runtime`], so that an interpreter can answer them from its own class representation. The
//! [`ClassGraph`] here is a self-contained implementation of those traits, with classes allocated
//! in an arena and keyed by their defining loader.

mod access_flags;
mod java_classes;
mod runtime;

pub use access_flags::*;
pub use java_classes::*;
pub use runtime::*;

use crate::names::BinaryName;
use crate::util::RefId;
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::cell::Cell;
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a class loader
///
/// Two classes with the same name but different defining loaders are different classes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u32);

impl LoaderId {
    /// Loader for the JDK classes, at the root of every delegation chain
    pub const BOOTSTRAP: LoaderId = LoaderId(0);
}

/// Tracks classes, their super types and their defining loaders
///
/// Lookups use parent-first delegation: a loader sees the classes of its parent loaders before
/// its own.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<(LoaderId, BinaryName), Box<ClassId<'g>>>,
    loader_parents: FrozenMap<LoaderId, Box<LoaderId>>,
    next_instance: Cell<usize>,
}

/// Class in the graph, compared by identity
pub type ClassId<'g> = RefId<'g, ClassData<'g>>;

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
            loader_parents: FrozenMap::new(),
            next_instance: Cell::new(0),
        }
    }

    /// Register a loader which delegates to `parent`
    pub fn add_loader(&self, loader: LoaderId, parent: LoaderId) {
        assert_ne!(loader, LoaderId::BOOTSTRAP, "bootstrap loader has no parent");
        self.loader_parents.insert(loader, Box::new(parent));
    }

    /// Parent of a loader (`None` for the bootstrap loader)
    pub fn loader_parent(&self, loader: LoaderId) -> Option<LoaderId> {
        if loader == LoaderId::BOOTSTRAP {
            None
        } else {
            Some(
                self.loader_parents
                    .get(&loader)
                    .copied()
                    .unwrap_or(LoaderId::BOOTSTRAP),
            )
        }
    }

    /// Add a new class to the class graph
    ///
    /// The class is defined by `data.loader`. Defining the same name twice in one loader replaces
    /// nothing: the first definition wins and is returned.
    pub fn add_class(&self, data: ClassData<'g>) -> ClassId<'g> {
        let key = (data.loader, data.name.clone());
        if let Some(existing) = self.classes.get(&key) {
            log::warn!(
                "Class {:?} already defined by loader {:?}",
                data.name,
                data.loader
            );
            return *existing;
        }
        let data = &*self.arenas.class_arena.alloc(data);
        let id = RefId(data);
        self.classes.insert(key, Box::new(id));
        log::trace!("Defined class {:?}", data);
        id
    }

    /// Find the class a loader sees for a name
    pub fn lookup(&self, name: &BinaryName, loader: LoaderId) -> Option<ClassId<'g>> {
        let from_parent = self
            .loader_parent(loader)
            .and_then(|parent| self.lookup(name, parent));
        from_parent.or_else(|| {
            self.classes.get(&(loader, name.clone())).copied()
        })
    }

    /// Allocate a fresh instance of a class
    pub fn instantiate(&self, class: ClassId<'g>) -> Instance<'g> {
        let identity = self.next_instance.get();
        self.next_instance.set(identity + 1);
        Instance { class, identity }
    }

    /// Add standard types to the class graph
    pub fn insert_java_library_types(&self) -> JavaClasses<'g> {
        JavaClasses::add_to_graph(self)
    }
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassId<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: FrozenVec<ClassId<'g>>,

    pub access_flags: ClassAccessFlags,

    /// Defining loader
    pub loader: LoaderId,
}

impl<'g> ClassData<'g> {
    pub fn new(
        name: BinaryName,
        superclass: ClassId<'g>,
        access_flags: ClassAccessFlags,
        loader: LoaderId,
    ) -> ClassData<'g> {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: FrozenVec::new(),
            access_flags,
            loader,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}

impl<'g> Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name.as_str(), self.loader.0)
    }
}

/// Object allocated from a [`ClassGraph`]
///
/// Instances only carry their class and an identity, which is all frame snapshots care about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instance<'g> {
    class: ClassId<'g>,
    identity: usize,
}

impl<'g> Instance<'g> {
    pub fn class_id(&self) -> ClassId<'g> {
        self.class
    }
}
