use bitflags::bitflags;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

impl ClassAccessFlags {
    /// Flags for an ordinary public class
    pub fn class() -> ClassAccessFlags {
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER
    }

    /// Flags for a public interface
    pub fn interface() -> ClassAccessFlags {
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT
    }
}
