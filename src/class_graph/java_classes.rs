use super::{ClassAccessFlags, ClassData, ClassGraph, ClassId, LoaderId};
use crate::names::BinaryName;
use elsa::FrozenVec;

/// Classes inside `java.*` that frames commonly mention
///
/// All of these are defined by the bootstrap loader.
pub struct JavaClasses<'g> {
    pub object: ClassId<'g>,
    pub cloneable: ClassId<'g>,
    pub serializable: ClassId<'g>,
    pub char_sequence: ClassId<'g>,
    pub comparable: ClassId<'g>,
    pub string: ClassId<'g>,
    pub number: ClassId<'g>,
    pub integer: ClassId<'g>,
    pub long: ClassId<'g>,
    pub throwable: ClassId<'g>,
    pub exception: ClassId<'g>,
    pub runtime_exception: ClassId<'g>,
}

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> JavaClasses<'g> {
        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            interfaces: FrozenVec::new(),
            access_flags: ClassAccessFlags::class(),
            loader: LoaderId::BOOTSTRAP,
        });

        let jdk_class = |name: BinaryName, superclass: ClassId<'g>, flags: ClassAccessFlags| {
            class_graph.add_class(ClassData::new(name, superclass, flags, LoaderId::BOOTSTRAP))
        };
        let final_class = ClassAccessFlags::class() | ClassAccessFlags::FINAL;

        let cloneable = jdk_class(BinaryName::CLONEABLE, object, ClassAccessFlags::interface());
        let serializable =
            jdk_class(BinaryName::SERIALIZABLE, object, ClassAccessFlags::interface());
        let char_sequence =
            jdk_class(BinaryName::CHARSEQUENCE, object, ClassAccessFlags::interface());
        let comparable = jdk_class(BinaryName::COMPARABLE, object, ClassAccessFlags::interface());
        let string = jdk_class(BinaryName::STRING, object, final_class);
        let number = jdk_class(
            BinaryName::NUMBER,
            object,
            ClassAccessFlags::class() | ClassAccessFlags::ABSTRACT,
        );
        let integer = jdk_class(BinaryName::INTEGER, number, final_class);
        let long = jdk_class(BinaryName::LONG, number, final_class);
        let throwable = jdk_class(BinaryName::THROWABLE, object, ClassAccessFlags::class());
        let exception = jdk_class(BinaryName::EXCEPTION, throwable, ClassAccessFlags::class());
        let runtime_exception = jdk_class(
            BinaryName::RUNTIMEEXCEPTION,
            exception,
            ClassAccessFlags::class(),
        );

        string.interfaces.push(serializable);
        string.interfaces.push(char_sequence);
        string.interfaces.push(comparable);
        number.interfaces.push(serializable);
        integer.interfaces.push(comparable);
        long.interfaces.push(comparable);
        throwable.interfaces.push(serializable);

        JavaClasses {
            object,
            cloneable,
            serializable,
            char_sequence,
            comparable,
            string,
            number,
            integer,
            long,
            throwable,
            exception,
            runtime_exception,
        }
    }
}
