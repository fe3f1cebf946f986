//! Call frames: an activation record holding the callee function, its
//! instruction pointer, and the base of its stack slots.

use std::rc::Rc;

use wisp_core::Object;

/// One activation record on the VM's call stack. `slot_base` indexes into
/// the VM's value stack at this function's slot 0 — the callee itself, as
/// `CALL` pushes it before the frame exists — with arguments following at
/// `slot_base + 1 ..= slot_base + arity`.
pub struct Frame {
    pub function: Rc<Object>,
    pub ip: usize,
    pub slot_base: usize,
}

impl Frame {
    pub fn new(function: Rc<Object>, slot_base: usize) -> Self {
        Frame {
            function,
            ip: 0,
            slot_base,
        }
    }

    pub fn name(&self) -> Option<String> {
        match self.function.as_ref() {
            Object::Function(f) => f.name.as_ref().map(|n| n.to_string()),
            _ => None,
        }
    }
}
