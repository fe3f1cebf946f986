//! The VM's object heap: interned strings, functions, and maps, under
//! one ownership registry.
//!
//! Collection policy is reference counting: every heap object is an
//! `Rc<Object>`, freed the moment its last reference drops. This is a
//! legitimate choice for the single-threaded, non-reentrant embedding
//! this crate targets — the one documented gap is that a cycle of maps
//! referencing each other leaks, since nothing here traces or breaks
//! cycles.

use std::cell::RefCell;
use std::rc::Rc;

use wisp_core::{NativeFunction, Object, WispFunction, WispMap};

use crate::intern::Interner;

pub struct Heap {
    pub strings: Interner,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            strings: Interner::new(),
        }
    }

    pub fn alloc_function(&self, function: WispFunction) -> Rc<Object> {
        Rc::new(Object::Function(function))
    }

    pub fn alloc_native(&self, native: NativeFunction) -> Rc<Object> {
        Rc::new(Object::Native(native))
    }

    pub fn alloc_map(&self, map: WispMap) -> Rc<Object> {
        Rc::new(Object::Map(RefCell::new(map)))
    }

    pub fn intern(&mut self, bytes: &[u8]) -> Rc<Object> {
        self.strings.intern(bytes)
    }

    pub fn intern_owned(&mut self, bytes: Box<[u8]>) -> Rc<Object> {
        self.strings.intern_owned(bytes)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
