use stable_deref_trait::StableDeref;
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

/// Elements with a width, in frame slots
///
/// `long` and `double` values take two slots in the locals and on the operand stack; everything
/// else takes one.
pub trait Width {
    fn width(&self) -> usize;
}

/// Wrapper type whose "identity" for equality and hashing is determined from the reference itself
/// (ie. the pointer) and not from the underlying data.
#[derive(Debug)]
pub struct RefId<'a, T: ?Sized>(pub &'a T);

impl<'a, T: ?Sized> Clone for RefId<'a, T> {
    fn clone(&self) -> Self {
        RefId(self.0)
    }
}

impl<'a, T: ?Sized> Copy for RefId<'a, T> {}

impl<'a, T: ?Sized> Hash for RefId<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl<'a, 'b, T: ?Sized> PartialEq<RefId<'b, T>> for RefId<'a, T> {
    fn eq(&self, other: &RefId<'b, T>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a, T: ?Sized> Eq for RefId<'a, T> {}

impl<'a, T: ?Sized> Deref for RefId<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

impl<'a, T: ?Sized> Borrow<T> for RefId<'a, T> {
    fn borrow(&self) -> &T {
        self.0
    }
}

unsafe impl<'a, T: ?Sized> StableDeref for RefId<'a, T> {}
