//! VM-wide string interning: canonicalizes byte-identical strings to one
//! heap object, so that `Value::equal` can treat string equality as
//! pointer identity.
//!
//! The pointer-keyed [`wisp_core::table::StringTable`] reused for globals
//! and map fields compares keys by `Rc` identity — it is the wrong tool
//! here, since interning itself must find an existing object *from raw
//! bytes*, before any `Rc` for those bytes exists. This table is therefore
//! a separate, content-keyed structure built directly on `std::HashMap`.

use std::collections::HashMap;
use std::rc::Rc;

use wisp_core::table::fnv1a;
use wisp_core::{Object, WispString};

#[derive(Default)]
pub struct Interner {
    table: HashMap<Box<[u8]>, Rc<Object>>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    /// The "copy" variant of `intern`: the caller retains ownership of
    /// `bytes`.
    pub fn intern(&mut self, bytes: &[u8]) -> Rc<Object> {
        if let Some(existing) = self.table.get(bytes) {
            return existing.clone();
        }
        self.intern_owned(bytes.to_vec().into_boxed_slice())
    }

    /// The "take" variant: adopts an already-allocated buffer instead of
    /// copying it — used for freshly built strings such as concatenation
    /// results.
    pub fn intern_owned(&mut self, bytes: Box<[u8]>) -> Rc<Object> {
        if let Some(existing) = self.table.get(bytes.as_ref()) {
            return existing.clone();
        }
        let hash = fnv1a(&bytes);
        let obj = Rc::new(Object::Str(WispString::new(bytes.clone(), hash)));
        self.table.insert(bytes, obj.clone());
        obj
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_intern_to_the_same_object() {
        let mut interner = Interner::new();
        let a = interner.intern(b"hello");
        let b = interner.intern(b"hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_bytes_intern_to_distinct_objects() {
        let mut interner = Interner::new();
        let a = interner.intern(b"hello");
        let b = interner.intern(b"world");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn take_variant_reuses_existing_entry_for_identical_bytes() {
        let mut interner = Interner::new();
        let a = interner.intern(b"foobar");
        let b = interner.intern_owned(b"foobar".to_vec().into_boxed_slice());
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }
}
