use framestate::class_graph::{
    ClassAccessFlags, ClassData, ClassGraph, ClassGraphArenas, ClassId, Instance, LoaderId,
};
use framestate::frame::{
    Activation, Error, FrameDescriptor, InterpreterFrame, ResumeChecks, Slot, SlotType, Snapshot,
};
use framestate::names::BinaryName;
use framestate::serialize::{Deserialize, Serialize};
use framestate::stackmap::{self, read_descriptors, MethodListing};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

/// A static method `void draw(Shape, long)` suspended while a fresh circle is on the stack
const LISTING: &str = "
    class app/Main
    method (Lapp/Shape;J)V static
    limits 4 3
    declare app/Shape
    declare app/Circle extends app/Shape
    declare app/Box
    new 0 app/Circle
    same1 4 uninit@0
    same 3
";

const APP: LoaderId = LoaderId(1);

struct Method<'g> {
    graph: ClassGraph<'g>,
    main: ClassId<'g>,
    listing: MethodListing,
    descriptors: BTreeMap<u32, Arc<FrameDescriptor>>,
}

fn method<'g>(arenas: &'g ClassGraphArenas<'g>) -> Method<'g> {
    let graph = ClassGraph::new(arenas);
    graph.insert_java_library_types();
    graph.add_loader(APP, LoaderId::BOOTSTRAP);

    let listing = stackmap::parse_table(LISTING).unwrap();
    let main = listing.declare_classes(&graph, APP).unwrap();
    let descriptors = listing.frame_table().unwrap().descriptors();
    Method {
        graph,
        main,
        listing,
        descriptors,
    }
}

fn class<'g>(method: &Method<'g>, name: &str) -> ClassId<'g> {
    let name = BinaryName::from_string(name.to_owned()).unwrap();
    method.graph.lookup(&name, APP).unwrap()
}

/// Activation stopped at offset 4
fn suspended<'g>(method: &Method<'g>) -> InterpreterFrame<Instance<'g>> {
    let circle = method.graph.instantiate(class(method, "app/Circle"));
    let mut frame = InterpreterFrame::new(8);
    frame.set_int(0, 4);
    frame.set_reference(1, Some(circle));
    frame.set_long(2, -7);
    frame.set_int(4, 99);
    frame.set_reference(5, Some(circle));
    frame
}

#[test]
fn descriptors_from_listing() {
    let arenas = ClassGraphArenas::new();
    let method = method(&arenas);
    assert_eq!(method.listing.frames.len(), 2);

    let bcis: Vec<u32> = method.descriptors.keys().copied().collect();
    assert_eq!(bcis, vec![4, 8]);

    let at_new = &method.descriptors[&4];
    assert_eq!(at_new.size(), 8);
    assert_eq!(
        at_new.locals(),
        &[
            SlotType::Object(BinaryName::from_string(String::from("app/Shape")).unwrap()),
            SlotType::Long,
            SlotType::Illegal,
            SlotType::Illegal,
        ]
    );
    assert_eq!(
        at_new.stack(),
        &[SlotType::Object(BinaryName::from_string(String::from("app/Circle")).unwrap())]
    );
    assert_eq!(method.descriptors[&8].top(), 0);
}

#[test]
fn suspend_and_resume() {
    let arenas = ClassGraphArenas::new();
    let method = method(&arenas);
    let descriptor = &method.descriptors[&4];
    let original = suspended(&method);

    let snapshot = descriptor.export(&original).unwrap();
    let mut resumed = InterpreterFrame::new(8);
    descriptor
        .resume(
            &snapshot,
            &mut resumed,
            method.main,
            &method.graph,
            ResumeChecks::default(),
        )
        .unwrap();

    assert_eq!(resumed.get_int(0), 4);
    assert_eq!(resumed.get_long(2), -7);
    assert_eq!(resumed.get_reference(1), original.get_reference(1));
    assert_eq!(resumed.get_reference(5), original.get_reference(5));

    // The unused local is not carried over
    assert_eq!(resumed.slot(4), &Slot::Empty);
}

#[test]
fn forged_snapshot_is_rejected() {
    let arenas = ClassGraphArenas::new();
    let method = method(&arenas);
    let descriptor = &method.descriptors[&4];

    let mut snapshot = descriptor.export(&suspended(&method)).unwrap();
    let a_box = method.graph.instantiate(class(&method, "app/Box"));
    snapshot.references[5] = Some(a_box);

    let mut resumed = InterpreterFrame::new(8);
    for checks in [ResumeChecks::default(), ResumeChecks::strict()] {
        let err = descriptor
            .resume(&snapshot, &mut resumed, method.main, &method.graph, checks)
            .unwrap_err();
        match err {
            Error::IllegalResumeType {
                slot,
                expected,
                actual,
            } => {
                assert_eq!(slot, 5);
                assert_eq!(expected.as_str(), "app/Circle");
                assert_eq!(actual.as_str(), "app/Box");
            }
            other => panic!("Expected illegal resume type, got {:?}", other),
        }
    }
    assert!(resumed.slots().iter().all(|slot| slot == &Slot::Empty));
}

#[test]
fn same_name_from_another_loader_is_rejected() {
    let arenas = ClassGraphArenas::new();
    let method = method(&arenas);
    let descriptor = &method.descriptors[&4];

    let plugin = LoaderId(2);
    method.graph.add_loader(plugin, LoaderId::BOOTSTRAP);
    let object = method
        .graph
        .lookup(&BinaryName::OBJECT, plugin)
        .unwrap();
    let impostor_class = method.graph.add_class(ClassData::new(
        BinaryName::from_string(String::from("app/Circle")).unwrap(),
        object,
        ClassAccessFlags::class(),
        plugin,
    ));

    let mut snapshot = descriptor.export(&suspended(&method)).unwrap();
    snapshot.references[5] = Some(method.graph.instantiate(impostor_class));

    let err = descriptor
        .validate_import(&snapshot, method.main, &method.graph)
        .unwrap_err();
    assert!(matches!(err, Error::IllegalResumeType { slot: 5, .. }));
}

#[test]
fn persisted_descriptors_and_primitives() {
    let arenas = ClassGraphArenas::new();
    let method = method(&arenas);

    let mut bytes = vec![];
    method
        .listing
        .frame_table()
        .unwrap()
        .write_descriptors(&mut bytes)
        .unwrap();
    let reloaded = read_descriptors(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(reloaded, method.descriptors);

    let descriptor = &reloaded[&4];
    let snapshot = descriptor.export(&suspended(&method)).unwrap();
    let (references, primitives) = snapshot.into_parts();
    let mut words = vec![];
    primitives.serialize(&mut words).unwrap();
    let primitives = Vec::<u64>::deserialize(&mut Cursor::new(words)).unwrap();

    let mut resumed = InterpreterFrame::new(8);
    descriptor
        .resume(
            &Snapshot::from_parts(references, primitives),
            &mut resumed,
            method.main,
            &method.graph,
            ResumeChecks::strict(),
        )
        .unwrap();
    assert_eq!(resumed.get_long(2), -7);
}
