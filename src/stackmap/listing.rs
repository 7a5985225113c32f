use super::{Error, FrameTable, StackMapFrame, VerificationType};
use crate::class_graph::{ClassAccessFlags, ClassData, ClassGraph, ClassId, LoaderId, RuntimeClass};
use crate::descriptors::MethodDescriptor;
use crate::names::BinaryName;
use std::str::{FromStr, SplitWhitespace};

/// Text description of one method's stack map, along with the classes it mentions
///
/// One directive per line, `#` starts a comment:
///
/// ```text
/// class app/Main                        # class declaring the method
/// method (ILjava/lang/String;)V static  # descriptor, and whether there is a `this`
/// limits 4 2                            # max locals, max stack
/// declare app/Shape extends java/lang/Object
/// declare interface app/Named implements java/lang/CharSequence
/// new 12 app/Shape                      # `new app/Shape` at offset 12
/// same 5                                # stack map entries: kind, offset delta, ...
/// same1 3 uninit@12
/// chop 0 1
/// append 2 int long
/// full 4 int app/Shape | double
/// merge 8 20                            # merge the frame at 8 into the one at 20
/// ```
///
/// Verification types are written `top`, `int`, `float`, `long`, `double`, `null`, `uninit_this`,
/// `uninit@<offset>`, or a class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodListing {
    pub this_class: BinaryName,
    pub descriptor: MethodDescriptor,
    pub is_static: bool,
    pub max_locals: usize,
    pub max_stack: usize,
    pub classes: Vec<ClassDeclaration>,
    pub new_sites: Vec<(u16, BinaryName)>,
    pub frames: Vec<StackMapFrame<BinaryName>>,
    pub merges: Vec<Merge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDeclaration {
    pub name: BinaryName,
    pub superclass: BinaryName,
    pub interfaces: Vec<BinaryName>,
    pub is_interface: bool,
}

/// Control flow from the frame recorded at `from` into the frame recorded at `into`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Merge {
    pub from: u32,
    pub into: u32,
}

/// Parse a text listing
pub fn parse_table(source: &str) -> Result<MethodListing, Error> {
    let mut this_class = None;
    let mut method = None;
    let mut limits = None;
    let mut classes = vec![];
    let mut new_sites = vec![];
    let mut frames = vec![];
    let mut merges = vec![];

    let mut line_count = 0;
    for (idx, text) in source.lines().enumerate() {
        line_count = idx + 1;
        let text = match text.find('#') {
            Some(comment) => &text[..comment],
            None => text,
        };
        let mut line = Line {
            number: idx + 1,
            words: text.split_whitespace(),
        };
        let directive = match line.words.next() {
            None => continue,
            Some(directive) => directive,
        };

        match directive {
            "class" => {
                let name = line.class()?;
                line.end()?;
                this_class = Some(name);
            }
            "method" => {
                let descriptor = line.word("method descriptor")?;
                let descriptor = MethodDescriptor::parse(descriptor)
                    .map_err(|err| line.error(format!("bad method descriptor: {}", err)))?;
                let is_static = match line.words.next() {
                    None => false,
                    Some("static") => true,
                    Some(other) => return Err(line.error(format!("unexpected '{}'", other))),
                };
                line.end()?;
                method = Some((descriptor, is_static));
            }
            "limits" => {
                let max_locals = line.number("max locals")?;
                let max_stack = line.number("max stack")?;
                line.end()?;
                limits = Some((max_locals, max_stack));
            }
            "declare" => classes.push(line.declaration()?),
            "new" => {
                let offset = line.number("offset")?;
                let class = line.class()?;
                line.end()?;
                new_sites.push((offset, class));
            }
            "merge" => {
                let from = line.number("source offset")?;
                let into = line.number("target offset")?;
                line.end()?;
                merges.push(Merge { from, into });
            }
            "same" | "same1" | "chop" | "append" | "full" => {
                frames.push(line.stack_map_frame(directive)?);
            }
            other => return Err(line.error(format!("unknown directive '{}'", other))),
        }
    }

    let missing = |what: &str| Error::Syntax {
        line: line_count,
        message: format!("missing `{}` line", what),
    };
    let this_class = this_class.ok_or_else(|| missing("class"))?;
    let (descriptor, is_static) = method.ok_or_else(|| missing("method"))?;
    let (max_locals, max_stack) = limits.ok_or_else(|| missing("limits"))?;

    Ok(MethodListing {
        this_class,
        descriptor,
        is_static,
        max_locals,
        max_stack,
        classes,
        new_sites,
        frames,
        merges,
    })
}

impl MethodListing {
    /// Define the declared classes in `loader`, and return the class declaring the method
    ///
    /// Super types must be declared before the classes extending them, or be visible to `loader`
    /// already. If the method's class is not declared, it is defined as a direct subclass of
    /// `java/lang/Object`.
    pub fn declare_classes<'g>(
        &self,
        class_graph: &ClassGraph<'g>,
        loader: LoaderId,
    ) -> Result<ClassId<'g>, Error> {
        let lookup = |name: &BinaryName| {
            class_graph
                .lookup(name, loader)
                .ok_or_else(|| Error::UnknownClass(name.clone()))
        };

        for declaration in &self.classes {
            let flags = if declaration.is_interface {
                ClassAccessFlags::interface()
            } else {
                ClassAccessFlags::class()
            };
            let superclass = lookup(&declaration.superclass)?;
            let data = ClassData::new(declaration.name.clone(), superclass, flags, loader);
            for interface in &declaration.interfaces {
                data.interfaces.push(lookup(interface)?);
            }
            class_graph.add_class(data);
        }

        match class_graph.lookup(&self.this_class, loader) {
            Some(this_class) => Ok(this_class),
            None => {
                let object = lookup(&BinaryName::OBJECT)?;
                let data = ClassData::new(
                    self.this_class.clone(),
                    object,
                    ClassAccessFlags::class(),
                    loader,
                );
                Ok(class_graph.add_class(data))
            }
        }
    }

    /// Replay the stack map of the listing
    pub fn frame_table(&self) -> Result<FrameTable, Error> {
        let mut table = FrameTable::new(
            self.this_class.clone(),
            &self.descriptor,
            self.is_static,
            self.max_locals,
            self.max_stack,
        )?;
        for (offset, class) in &self.new_sites {
            table.register_new_site(*offset, class.clone());
        }
        table.replay(&self.frames)?;
        Ok(table)
    }

    /// Apply the merges of the listing, in order, and return how many changed a frame
    pub fn apply_merges<K, F>(&self, table: &mut FrameTable, mut resolve: F) -> Result<usize, Error>
    where
        K: RuntimeClass,
        F: FnMut(&BinaryName) -> Option<K>,
    {
        let mut changed = 0;
        for merge in &self.merges {
            let incoming = table
                .recorded(merge.from)
                .ok_or_else(|| Error::InvalidTable {
                    bci: merge.from,
                    message: String::from("no frame recorded"),
                })?
                .copy();
            if table.merge_at(merge.into, &incoming, false, &mut resolve)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

struct Line<'a> {
    number: usize,
    words: SplitWhitespace<'a>,
}

impl<'a> Line<'a> {
    fn error(&self, message: String) -> Error {
        Error::Syntax {
            line: self.number,
            message,
        }
    }

    fn word(&mut self, what: &str) -> Result<&'a str, Error> {
        match self.words.next() {
            Some(word) => Ok(word),
            None => Err(self.error(format!("expected {}", what))),
        }
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T, Error> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| self.error(format!("bad {} '{}'", what, word)))
    }

    fn class(&mut self) -> Result<BinaryName, Error> {
        let word = self.word("class name")?;
        BinaryName::from_string(word.to_owned()).map_err(|msg| self.error(msg))
    }

    fn end(&mut self) -> Result<(), Error> {
        match self.words.next() {
            None => Ok(()),
            Some(extra) => Err(self.error(format!("unexpected '{}'", extra))),
        }
    }

    fn verification_type(&self, word: &str) -> Result<VerificationType<BinaryName>, Error> {
        Ok(match word {
            "top" => VerificationType::Top,
            "int" => VerificationType::Integer,
            "float" => VerificationType::Float,
            "long" => VerificationType::Long,
            "double" => VerificationType::Double,
            "null" => VerificationType::Null,
            "uninit_this" => VerificationType::UninitializedThis,
            _ => match word.strip_prefix("uninit@") {
                Some(offset) => {
                    let offset = offset
                        .parse()
                        .map_err(|_| self.error(format!("bad `new` offset '{}'", offset)))?;
                    VerificationType::Uninitialized(offset)
                }
                None => {
                    let class = BinaryName::from_string(word.to_owned())
                        .map_err(|msg| self.error(msg))?;
                    VerificationType::Object(class)
                }
            },
        })
    }

    /// `declare [interface] <name> [extends <super>] [implements <iface>...]`
    fn declaration(&mut self) -> Result<ClassDeclaration, Error> {
        let mut is_interface = false;
        let mut word = self.word("class name")?;
        if word == "interface" {
            is_interface = true;
            word = self.word("class name")?;
        }
        let name = BinaryName::from_string(word.to_owned()).map_err(|msg| self.error(msg))?;

        let mut superclass = BinaryName::OBJECT;
        let mut interfaces = vec![];
        let mut keyword = self.words.next();
        if keyword == Some("extends") {
            superclass = self.class()?;
            keyword = self.words.next();
        }
        match keyword {
            None => (),
            Some("implements") => {
                while let Some(word) = self.words.next() {
                    let interface =
                        BinaryName::from_string(word.to_owned()).map_err(|msg| self.error(msg))?;
                    interfaces.push(interface);
                }
            }
            Some(other) => return Err(self.error(format!("unexpected '{}'", other))),
        }

        Ok(ClassDeclaration {
            name,
            superclass,
            interfaces,
            is_interface,
        })
    }

    fn stack_map_frame(&mut self, kind: &str) -> Result<StackMapFrame<BinaryName>, Error> {
        let offset_delta = self.number("offset delta")?;
        let frame = match kind {
            "same" => StackMapFrame::SameLocalsNoStack { offset_delta },
            "same1" => {
                let word = self.word("stack item")?;
                StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack: self.verification_type(word)?,
                }
            }
            "chop" => {
                let chopped_k = self.number("number of chopped locals")?;
                if !(1..=3).contains(&chopped_k) {
                    return Err(self.error(String::from("chop frames remove 1 to 3 locals")));
                }
                StackMapFrame::ChopLocalsNoStack {
                    offset_delta,
                    chopped_k,
                }
            }
            "append" => {
                let locals = self.verification_types()?;
                if !(1..=3).contains(&locals.len()) {
                    return Err(self.error(String::from("append frames add 1 to 3 locals")));
                }
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            _ => {
                let locals = self.verification_types()?;
                let stack = self.verification_types()?;
                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
        };
        self.end()?;
        Ok(frame)
    }

    /// Verification types up to the end of the line or a `|`
    fn verification_types(&mut self) -> Result<Vec<VerificationType<BinaryName>>, Error> {
        let mut types = vec![];
        while let Some(word) = self.words.next() {
            if word == "|" {
                break;
            }
            types.push(self.verification_type(word)?);
        }
        Ok(types)
    }
}

impl FromStr for MethodListing {
    type Err = Error;

    fn from_str(source: &str) -> Result<MethodListing, Error> {
        parse_table(source)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::class_graph::ClassGraphArenas;
    use crate::frame::SlotType;

    const LISTING: &str = "
        # Shapes
        class app/Main
        method (Lapp/Shape;I)V static
        limits 4 2

        declare app/Shape
        declare app/Circle extends app/Shape implements java/io/Serializable
        declare app/Square extends app/Shape
        new 3 app/Circle

        same1 6 uninit@3
        append 5 app/Circle
        same 3
        full 2 app/Square int app/Square
        merge 12 19 # circle into square
    ";

    #[test]
    fn parse_listing() {
        let listing: MethodListing = LISTING.parse().unwrap();
        assert_eq!(listing.this_class.as_str(), "app/Main");
        assert!(listing.is_static);
        assert_eq!(listing.descriptor.parameters.len(), 2);
        assert_eq!((listing.max_locals, listing.max_stack), (4, 2));
        assert_eq!(listing.classes.len(), 3);
        assert_eq!(listing.classes[0].superclass, BinaryName::OBJECT);
        assert_eq!(listing.classes[1].interfaces, vec![BinaryName::SERIALIZABLE]);
        assert_eq!(listing.frames.len(), 4);
        assert_eq!(
            listing.frames[3],
            StackMapFrame::Full {
                offset_delta: 2,
                locals: vec![
                    VerificationType::Object(BinaryName::from_string(String::from("app/Square")).unwrap()),
                    VerificationType::Integer,
                    VerificationType::Object(BinaryName::from_string(String::from("app/Square")).unwrap()),
                ],
                stack: vec![],
            }
        );
        assert_eq!(listing.merges, vec![Merge { from: 12, into: 19 }]);
    }

    #[test]
    fn syntax_errors() {
        let cases = [
            ("class app/Main\nlimits 1", 2),
            ("class app/Main\nmethod ()V sometimes", 2),
            ("bogus", 1),
            ("class app/Main\nsame1 0 [[", 2),
            ("chop 0 4", 1),
            ("append 0", 1),
            ("same 0 extra", 1),
            ("class app/Main\nmethod ()V", 2),
        ];
        for (source, error_line) in cases {
            match parse_table(source) {
                Err(Error::Syntax { line, .. }) => assert_eq!(line, error_line, "{}", source),
                other => panic!("Expected syntax error for {:?}, got {:?}", source, other),
            }
        }
    }

    #[test]
    fn build_from_listing() {
        let listing = parse_table(LISTING).unwrap();
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let loader = LoaderId(3);
        class_graph.add_loader(loader, LoaderId::BOOTSTRAP);

        let main = listing.declare_classes(&class_graph, loader).unwrap();
        assert_eq!(main.name().as_str(), "app/Main");
        assert_eq!(main.0.superclass, Some(java.object));
        let circle = class_graph
            .lookup(&listing.classes[1].name, loader)
            .unwrap();
        assert!(java.serializable.is_assignable_from(&circle));

        let mut table = listing.frame_table().unwrap();
        let bcis: Vec<u32> = table.frames().map(|(bci, _)| bci).collect();
        assert_eq!(bcis, vec![6, 12, 16, 19]);
        let circle_type = SlotType::Object(listing.classes[1].name.clone());
        assert_eq!(table.recorded(6).unwrap().kinds()[5], circle_type);
        assert_eq!(table.recorded(12).unwrap().get_local(2), &circle_type);

        let changed = listing
            .apply_merges(&mut table, |name| class_graph.lookup(name, loader))
            .unwrap();
        assert_eq!(changed, 1);
        let shape_type = SlotType::Object(listing.classes[0].name.clone());
        let merged = table.recorded(19).unwrap();
        assert_eq!(merged.get_local(0), &shape_type);
        assert_eq!(merged.get_local(1), &SlotType::Int);
        assert_eq!(merged.get_local(2), &shape_type);
        assert_eq!(merged.bci(), Some(19));
    }

    #[test]
    fn undeclared_super_types() {
        let listing = parse_table(
            "class app/Main\nmethod ()V\nlimits 1 0\ndeclare app/Circle extends app/Shape",
        )
        .unwrap();
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        class_graph.insert_java_library_types();
        match listing.declare_classes(&class_graph, LoaderId::BOOTSTRAP) {
            Err(Error::UnknownClass(name)) => assert_eq!(name.as_str(), "app/Shape"),
            other => panic!("Expected unknown class, got {:?}", other.map(|_| ())),
        }
    }
}
