use crate::descriptors::FieldType;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of classes and interfaces, as they appear in `CONSTANT_Class` entries
///
/// This is usually the internal binary name (`java/lang/String`), except for array classes which
/// use their field descriptor (`[I`, `[Ljava/lang/Object;`).
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl BinaryName {
    /// Check if a string would be a valid binary name
    pub fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else if name.starts_with('[') {
            FieldType::parse(name)
                .map(|_| ())
                .map_err(|err| format!("Array class name '{}' is invalid: {}", name, err))
        } else {
            name.split('/').map(check_unqualified).collect()
        }
    }

    /// Try to construct a name from a string
    pub fn from_string(name: String) -> Result<BinaryName, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }

    /// Name of an array class, from a descriptor that was already parsed as an array type
    pub(crate) fn array(descriptor: String) -> BinaryName {
        debug_assert!(descriptor.starts_with('['));
        BinaryName(Cow::Owned(descriptor))
    }

    /// Extract the raw underlying string name
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// Name with `.` separators, as used in messages shown to Java code
    pub fn external_name(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Is this the name of an array class?
    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }

    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const NUMBER: Self = Self::name("java/lang/Number");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const CHARSEQUENCE: Self = Self::name("java/lang/CharSequence");
    pub const COMPARABLE: Self = Self::name("java/lang/Comparable");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const CLONEABLE: Self = Self::name("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::name("java/io/Serializable");
}

/// Each `/`-separated segment must be non-empty and free of `.`, `;`, `[`
fn check_unqualified(segment: &str) -> Result<(), String> {
    if segment.contains(&['.', ';', '['][..]) {
        Err(format!(
            "Unqualified name '{}' contains an illegal character",
            segment
        ))
    } else if segment.is_empty() {
        Err(String::from("Binary name has an empty segment"))
    } else {
        Ok(())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
