//! Field and method descriptors, as far as frame layouts care
//!
//! A descriptor matters here only for the slots its values occupy: the parameters that make up a
//! method's entry frame, and values pushed for field reads and call returns. Array types are kept
//! whole, as the class name they have in stack map tables (`[[I`, `[Ljava/lang/String;`).

use crate::names::BinaryName;
use crate::util::Width;
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::CharIndices;

/// Arrays have at most this many dimensions
const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    fn from_char(c: char) -> Option<BaseType> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

/// Type of a field, parameter, or return value
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Object(BinaryName),

    /// Array, named by its own descriptor
    Array(BinaryName),
}

impl FieldType {
    pub fn parse(source: &str) -> Result<FieldType> {
        let mut reader = Reader::new(source);
        let field_type = reader.field_type()?;
        reader.finish()?;
        Ok(field_type)
    }

    /// Class of the values of this type, unless they are primitives
    pub fn class_name(&self) -> Option<&BinaryName> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(name) | FieldType::Array(name) => Some(name),
        }
    }
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            _ => 1,
        }
    }
}

/// Signature of a method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(source: &str) -> Result<MethodDescriptor> {
        let mut reader = Reader::new(source);
        if !reader.eat('(') {
            return Err(reader.invalid("Expected '(' to open the parameters"));
        }
        let mut parameters = vec![];
        while !reader.eat(')') {
            parameters.push(reader.field_type()?);
        }
        let return_type = if reader.eat('V') {
            None
        } else {
            Some(reader.field_type()?)
        };
        reader.finish()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Number of local slots taken by the parameters, and by `this` if there is one
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

/// Cursor over a descriptor string
struct Reader<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Reader<'a> {
        Reader {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn position(&mut self) -> usize {
        match self.chars.peek() {
            Some((idx, _)) => *idx,
            None => self.source.len(),
        }
    }

    fn invalid(&mut self, message: &str) -> Error {
        let msg = format!("{} at offset {} of '{}'", message, self.position(), self.source);
        Error::new(ErrorKind::InvalidInput, msg)
    }

    fn truncated(&self, message: &str) -> Error {
        let msg = format!("{} in '{}'", message, self.source);
        Error::new(ErrorKind::UnexpectedEof, msg)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn finish(&mut self) -> Result<()> {
        if self.chars.peek().is_some() {
            Err(self.invalid("Unexpected leftover input"))
        } else {
            Ok(())
        }
    }

    fn field_type(&mut self) -> Result<FieldType> {
        let start = self.position();
        match self.chars.peek().copied() {
            None => Err(self.truncated("Missing field type")),
            Some((_, 'L')) => Ok(FieldType::Object(self.class_name()?)),
            Some((_, '[')) => {
                let mut dimensions = 0;
                while self.eat('[') {
                    dimensions += 1;
                }
                if dimensions > MAX_ARRAY_DIMENSIONS {
                    return Err(self.invalid("Too many array dimensions"));
                }
                match self.chars.peek().copied() {
                    Some((_, 'L')) => {
                        self.class_name()?;
                    }
                    _ => {
                        self.base_type()?;
                    }
                }
                let end = self.position();
                let descriptor = self.source[start..end].to_owned();
                Ok(FieldType::Array(BinaryName::array(descriptor)))
            }
            Some(_) => self.base_type().map(FieldType::Base),
        }
    }

    fn base_type(&mut self) -> Result<BaseType> {
        match self.chars.peek().copied() {
            None => Err(self.truncated("Missing base type")),
            Some((_, c)) => match BaseType::from_char(c) {
                Some(base_type) => {
                    self.chars.next();
                    Ok(base_type)
                }
                None => Err(self.invalid(&format!("Invalid type character '{}'", c))),
            },
        }
    }

    /// `L<name>;`
    fn class_name(&mut self) -> Result<BinaryName> {
        if !self.eat('L') {
            return Err(self.invalid("Expected 'L' to start a class type"));
        }
        let start = self.position();
        loop {
            match self.chars.next() {
                None => return Err(self.truncated("Missing ';' after class name")),
                Some((end, ';')) => {
                    let name = self.source[start..end].to_owned();
                    if name.starts_with('[') {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            format!("Array type '{}' used as a class type", name),
                        ));
                    }
                    return BinaryName::from_string(name)
                        .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg));
                }
                Some(_) => (),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_field_types() {
        assert_eq!(FieldType::parse("Z").unwrap(), FieldType::Base(BaseType::Boolean));
        assert_eq!(
            FieldType::parse("Ljava/lang/String;").unwrap(),
            FieldType::Object(BinaryName::STRING)
        );
        let long_matrix = FieldType::parse("[[J").unwrap();
        assert_eq!(long_matrix.class_name().map(BinaryName::as_str), Some("[[J"));
        assert_eq!(long_matrix.width(), 1);
        assert_eq!(FieldType::parse("D").unwrap().width(), 2);
        assert_eq!(FieldType::parse("I").unwrap().class_name(), None);
    }

    #[test]
    fn malformed_field_types() {
        for source in ["", "V", "II", "Ljava/lang/String", "L;", "L[I;", "[", "[V", "Ljava.lang.String;"] {
            assert!(FieldType::parse(source).is_err(), "{:?}", source);
        }

        let deep = format!("{}I", "[".repeat(256));
        assert!(FieldType::parse(&deep).is_err());
        let deepest = format!("{}I", "[".repeat(255));
        assert!(FieldType::parse(&deepest).is_ok());

        let err = FieldType::parse("IX").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("offset 1"), "{}", err);
    }

    #[test]
    fn parse_method_descriptor() {
        let desc = MethodDescriptor::parse("(IJ[Ljava/lang/Object;D)V").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(
            desc.parameters[2].class_name().map(BinaryName::as_str),
            Some("[Ljava/lang/Object;")
        );
        assert_eq!(desc.return_type, None);
        assert_eq!(desc.parameter_length(false), 6);
        assert_eq!(desc.parameter_length(true), 7);

        let desc = MethodDescriptor::parse("()Ljava/lang/Number;").unwrap();
        assert!(desc.parameters.is_empty());
        assert_eq!(desc.return_type, Some(FieldType::Object(BinaryName::NUMBER)));

        for source in ["IJ)V", "(I", "(I)", "(I)VV", "(V)V"] {
            assert!(MethodDescriptor::parse(source).is_err(), "{:?}", source);
        }
    }
}
