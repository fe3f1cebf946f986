//! The stack-based bytecode interpreter: dispatch loop, call frames,
//! runtime coercions, and the error/stack-trace protocol.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use wisp_core::{Chunk, Object, OpCode, StringTable, Value, WispMap};
use wisp_compiler::CompileError;

use crate::error::{FrameTrace, RuntimeError};
use crate::frame::Frame;
use crate::heap::Heap;
use crate::natives;

/// The call-stack depth check in `CALL`'s own opcode semantics is the
/// authoritative limit here; 256 matches that check rather than the looser
/// "64 frames typical" sizing aside that describes ordinary programs.
const FRAMES_MAX: usize = 256;

/// The outcome of [`Vm::interpret_source`], matching the conventional
/// `OK` / `COMPILE_ERROR` / `RUNTIME_ERROR` result codes while still
/// carrying the diagnostics a host needs to report them.
pub enum InterpretResult {
    Ok,
    CompileError(Vec<CompileError>),
    RuntimeError(RuntimeError),
}

impl InterpretResult {
    /// The conventional process exit code: 0/65/70.
    pub fn exit_code(&self) -> i32 {
        match self {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError(_) => 65,
            InterpretResult::RuntimeError(_) => 70,
        }
    }
}

/// A single-threaded, synchronous bytecode VM. No opcode ever blocks or
/// yields.
///
/// Heap, string interning, and the globals table live behind `Rc<RefCell<_>>`
/// so that [`Vm::clone_child`] can hand out a second execution context —
/// its own value stack and frame stack — that shares all three. Callers
/// that mutate shared globals/strings concurrently across clones must
/// serialize externally; this crate does not add locking.
pub struct Vm {
    heap: Rc<RefCell<Heap>>,
    globals: Rc<RefCell<StringTable>>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    trace: bool,
    clock_origin: Instant,
}

impl Vm {
    /// Constructs a VM with a fresh globals/strings table.
    pub fn new() -> Self {
        let mut vm = Vm {
            heap: Rc::new(RefCell::new(Heap::new())),
            globals: Rc::new(RefCell::new(StringTable::new())),
            stack: Vec::new(),
            frames: Vec::new(),
            trace: false,
            clock_origin: Instant::now(),
        };
        vm.install_natives();
        vm
    }

    /// A "child" VM sharing the heap, globals, and strings of `self` but
    /// with its own value stack and frame stack, supporting cooperative
    /// sub-invocations without rebuilding state.
    pub fn clone_child(&self) -> Self {
        Vm {
            heap: self.heap.clone(),
            globals: self.globals.clone(),
            stack: Vec::new(),
            frames: Vec::new(),
            trace: self.trace,
            clock_origin: self.clock_origin,
        }
    }

    /// Enables the `--trace` execution mode: every dispatched instruction
    /// and the current stack are logged via `tracing::trace!`.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    fn install_natives(&mut self) {
        let native = natives::clock(self.clock_origin);
        let name = self.heap.borrow_mut().intern(native.name.as_bytes());
        let func = self.heap.borrow().alloc_native(native);
        self.globals.borrow_mut().set(name, Value::Object(func));
    }

    // ----- host manipulation --------------------------------------------

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("stack underflow: the compiler emits only balanced bytecode")
    }

    fn peek(&self, distance: usize) -> &Value {
        let len = self.stack.len();
        &self.stack[len - 1 - distance]
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        let key = self.heap.borrow_mut().intern(name.as_bytes());
        self.globals.borrow_mut().set(key, value);
    }

    /// Compiles `source`, pushes the resulting script function, calls it
    /// with zero arguments, and executes to completion.
    pub fn interpret_source(&mut self, source: &str, filename: &str) -> InterpretResult {
        let function = match wisp_compiler::compile(source, filename) {
            Ok(f) => f,
            Err(errors) => return InterpretResult::CompileError(errors),
        };
        self.interpret_function(function)
    }

    /// The lower-level half of `interpret_source`: runs an already
    /// compiled top-level function. Exposed so that callers (and tests
    /// exercising opcodes with no surface syntax, like `GETI`/`SETI`) can
    /// hand-build a `Chunk` and execute it without going through the
    /// parser.
    pub fn interpret_function(&mut self, function: wisp_core::WispFunction) -> InterpretResult {
        let script = self.heap.borrow().alloc_function(function);
        self.stack.push(Value::Object(script.clone()));
        self.frames.push(Frame::new(script, 0));

        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(e) => {
                // A runtime error resets the stack to empty, with no frames.
                self.stack.clear();
                self.frames.clear();
                InterpretResult::RuntimeError(e)
            }
        }
    }

    // ----- dispatch loop -------------------------------------------------

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let frame_idx = self.frames.len() - 1;
            // Cloning the Rc is a refcount bump, not a deep copy, and it
            // sidesteps borrowing `chunk` from `self` while the match arms
            // below still need `&mut self` for push/pop.
            let function = self.frames[frame_idx].function.clone();
            let chunk: &Chunk = match function.as_ref() {
                Object::Function(f) => &f.chunk,
                _ => unreachable!("a frame's function slot always holds Object::Function"),
            };

            let mut ip = self.frames[frame_idx].ip;
            let op_byte = chunk.read_byte(ip);
            ip += 1;
            let op = match OpCode::from_u8(op_byte) {
                Some(op) => op,
                None => {
                    self.frames[frame_idx].ip = ip;
                    return Err(self.runtime_error("Unknown opcode."));
                }
            };

            let operand: u32 = match op.operand_width() {
                0 => 0,
                1 => {
                    let b = chunk.read_byte(ip);
                    ip += 1;
                    b as u32
                }
                2 => {
                    let v = chunk.read_u16_be(ip);
                    ip += 2;
                    v as u32
                }
                _ => unreachable!("operand widths are only ever 0, 1, or 2 bytes"),
            };
            // Recorded before executing the opcode's effect so that any
            // error it raises reports this instruction's own line/column.
            self.frames[frame_idx].ip = ip;

            if self.trace {
                tracing::trace!(
                    ip = ip - (1 + op.operand_width()),
                    ?op,
                    operand,
                    stack_depth = self.stack.len(),
                    "dispatch"
                );
            }

            match op {
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),

                OpCode::Const | OpCode::ConstLong => {
                    let value = chunk.constant(operand as usize).clone();
                    self.push(value);
                }

                OpCode::Pop => {
                    self.pop();
                }

                OpCode::Print => self.op_print(operand as usize),

                OpCode::Def | OpCode::DefLong => self.op_def(chunk, operand as usize),
                OpCode::Gld | OpCode::GldLong => self.op_gld(chunk, operand as usize)?,
                OpCode::Gst | OpCode::GstLong => self.op_gst(chunk, operand as usize)?,

                OpCode::Ld => {
                    let slot = self.frames[frame_idx].slot_base + operand as usize;
                    self.push(self.stack[slot].clone());
                }
                OpCode::St => {
                    let slot = self.frames[frame_idx].slot_base + operand as usize;
                    self.stack[slot] = self.peek(0).clone();
                }

                OpCode::Jmp => {
                    ip += operand as usize;
                    self.frames[frame_idx].ip = ip;
                }
                OpCode::Jmpf => {
                    if self.peek(0).is_falsey() {
                        ip += operand as usize;
                        self.frames[frame_idx].ip = ip;
                    }
                }
                OpCode::Loop => {
                    ip -= operand as usize;
                    self.frames[frame_idx].ip = ip;
                }

                OpCode::Call => {
                    self.call_value(operand as u8)?;
                }
                OpCode::Ret => {
                    let result = self.pop();
                    let outgoing = self.frames.pop().expect("Ret with an empty frame stack");
                    self.stack.truncate(outgoing.slot_base);
                    self.push(result);
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                }

                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsey()));
                }
                OpCode::Neg => self.op_neg()?,

                OpCode::Eq => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a.equal(&b)));
                }
                OpCode::Lt => self.op_compare(|a, b| a < b)?,
                OpCode::Le => self.op_compare(|a, b| a <= b)?,

                OpCode::Add => self.op_add()?,
                OpCode::Sub => self.op_arith(|a, b| a - b)?,
                OpCode::Mul => self.op_arith(|a, b| a * b)?,
                OpCode::Div => self.op_arith(|a, b| a / b)?,

                OpCode::Map => self.op_map(operand as usize),
                OpCode::Get => self.op_get(chunk, operand as usize)?,
                OpCode::Set => self.op_set(chunk, operand as usize)?,
                OpCode::Geti => self.op_geti()?,
                OpCode::Seti => self.op_seti()?,
            }
        }
    }

    // ----- opcode helpers ------------------------------------------------

    fn op_print(&mut self, n: usize) {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.pop());
        }
        let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        println!("{}", rendered.join("\t"));
    }

    fn op_def(&mut self, chunk: &Chunk, idx: usize) {
        let name = global_name(chunk, idx);
        let value = self.pop();
        self.globals.borrow_mut().set(name, value);
    }

    fn op_gld(&mut self, chunk: &Chunk, idx: usize) -> Result<(), RuntimeError> {
        let name = global_name(chunk, idx);
        let value = self.globals.borrow().get(&name).cloned();
        match value {
            Some(v) => {
                self.push(v);
                Ok(())
            }
            None => Err(self.runtime_error(format!("Undefined variable '{name}'."))),
        }
    }

    /// Checks existence first rather than an insert-then-remove dance to
    /// produce the error — simpler, with identical observable behavior.
    fn op_gst(&mut self, chunk: &Chunk, idx: usize) -> Result<(), RuntimeError> {
        let name = global_name(chunk, idx);
        if !self.globals.borrow().contains(&name) {
            return Err(self.runtime_error(format!("Undefined variable '{name}'.")));
        }
        let value = self.peek(0).clone();
        self.globals.borrow_mut().set(name, value);
        Ok(())
    }

    fn op_neg(&mut self) -> Result<(), RuntimeError> {
        let v = self.pop();
        match v {
            // `true` -> -1.0, `false` -> -0.0: an intentional coercion,
            // not a type error.
            Value::Bool(b) => {
                self.push(Value::Number(if b { -1.0 } else { -0.0 }));
                Ok(())
            }
            Value::Number(n) => {
                self.push(Value::Number(-n));
                Ok(())
            }
            _ => Err(self.runtime_error("Operand must be a number.")),
        }
    }

    fn op_compare(&mut self, f: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (coerce_number(&a), coerce_number(&b)) {
            (Some(x), Some(y)) => {
                self.push(Value::Bool(f(x, y)));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    fn op_arith(&mut self, f: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (coerce_number(&a), coerce_number(&b)) {
            (Some(x), Some(y)) => {
                self.push(Value::Number(f(x, y)));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    fn op_add(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        if let (Some(sa), Some(sb)) = (a.as_str(), b.as_str()) {
            let mut bytes = sa.as_bytes().to_vec();
            bytes.extend_from_slice(sb.as_bytes());
            let concatenated = self.heap.borrow_mut().intern_owned(bytes.into_boxed_slice());
            self.push(Value::Object(concatenated));
            return Ok(());
        }
        match (coerce_number(&a), coerce_number(&b)) {
            (Some(x), Some(y)) => {
                self.push(Value::Number(x + y));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be two numbers or two strings.")),
        }
    }

    /// Pops `n` values (in push order), builds a map whose pointer-keyed
    /// hash holds `index -> value` for `i in 0..n`, and pushes it. Keys use
    /// the same raw-bits encoding `GETI`/`SETI` use for `Number` keys, so a
    /// map literal's elements are reachable by `m[0]`, `m[1]`, ... through
    /// either opcode.
    fn op_map(&mut self, n: usize) {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.pop());
        }
        values.reverse();
        let mut map = WispMap::new();
        for (i, value) in values.into_iter().enumerate() {
            map.raw.set((i as f64).to_bits(), value);
        }
        let obj = self.heap.borrow().alloc_map(map);
        self.push(Value::Object(obj));
    }

    fn op_get(&mut self, chunk: &Chunk, idx: usize) -> Result<(), RuntimeError> {
        let map_val = self.pop();
        let map = match map_val.as_map() {
            Some(m) => m,
            None => return Err(self.runtime_error("Only maps have properties.")),
        };
        let name = global_name(chunk, idx);
        let result = map.borrow().strings.get(&name).cloned().unwrap_or(Value::Nil);
        self.push(result);
        Ok(())
    }

    fn op_set(&mut self, chunk: &Chunk, idx: usize) -> Result<(), RuntimeError> {
        let value = self.pop();
        let map_val = self.pop();
        let map = match map_val.as_map() {
            Some(m) => m,
            None => return Err(self.runtime_error("Only maps have properties.")),
        };
        let name = global_name(chunk, idx);
        map.borrow_mut().strings.set(name, value.clone());
        self.push(value);
        Ok(())
    }

    fn op_geti(&mut self) -> Result<(), RuntimeError> {
        let key = self.pop();
        let map_val = self.pop();
        let map = match map_val.as_map() {
            Some(m) => m,
            None => return Err(self.runtime_error("Only maps support subscript access.")),
        };
        let result = match &key {
            Value::Number(n) => map.borrow().raw.get(n.to_bits()).cloned().unwrap_or(Value::Nil),
            Value::Object(o) if matches!(o.as_ref(), Object::Str(_)) => {
                map.borrow().strings.get(o).cloned().unwrap_or(Value::Nil)
            }
            _ => return Err(self.runtime_error("Map keys must be numbers or strings.")),
        };
        self.push(result);
        Ok(())
    }

    fn op_seti(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let key = self.pop();
        let map_val = self.pop();
        let map = match map_val.as_map() {
            Some(m) => m,
            None => return Err(self.runtime_error("Only maps support subscript access.")),
        };
        match &key {
            Value::Number(n) => {
                map.borrow_mut().raw.set(n.to_bits(), value.clone());
            }
            Value::Object(o) if matches!(o.as_ref(), Object::Str(_)) => {
                map.borrow_mut().strings.set(o.clone(), value.clone());
            }
            _ => return Err(self.runtime_error("Map keys must be numbers or strings.")),
        }
        self.push(value);
        Ok(())
    }

    /// `CALL`'s full semantics: inspects the callee at `peek(argc)` and
    /// dispatches to a compiled function (push a new frame), a native
    /// (invoke synchronously), or errors.
    fn call_value(&mut self, argc: u8) -> Result<(), RuntimeError> {
        let argc = argc as usize;
        let callee_index = self.stack.len() - argc - 1;
        let callee = self.stack[callee_index].clone();
        let object = match callee.as_object() {
            Some(o) => o,
            None => return Err(self.runtime_error("Can only call functions and classes.")),
        };
        match object.as_ref() {
            Object::Function(f) => {
                if f.arity as usize != argc {
                    return Err(self.runtime_error(format!(
                        "Expected {} arguments but got {}.",
                        f.arity, argc
                    )));
                }
                if self.frames.len() >= FRAMES_MAX {
                    return Err(self.runtime_error("Stack overflow."));
                }
                tracing::debug!(name = ?f.name.as_ref().map(|n| n.to_string()), argc, "call");
                self.frames.push(Frame::new(object.clone(), callee_index));
                Ok(())
            }
            Object::Native(native) => {
                let args = self.stack[callee_index + 1..].to_vec();
                let result = (native.func)(&args).map_err(|msg| self.runtime_error(msg))?;
                self.stack.truncate(callee_index);
                self.push(result);
                Ok(())
            }
            _ => Err(self.runtime_error("Can only call functions and classes.")),
        }
    }

    /// The runtime error protocol: walks frames most-recent-first,
    /// rendering `[file:line:column] in <name|script>` from each frame's
    /// own chunk and the `ip` that was current when the error occurred.
    fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let mut trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let f = match frame.function.as_ref() {
                Object::Function(f) => f,
                _ => continue,
            };
            let offset = frame.ip.saturating_sub(1);
            trace.push(FrameTrace {
                name: frame.name(),
                file: f.chunk.source.filename.clone(),
                line: f.chunk.line_at(offset),
                column: f.chunk.column_at(offset),
            });
        }
        RuntimeError {
            message: message.into(),
            frames: trace,
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

fn global_name(chunk: &Chunk, idx: usize) -> Rc<Object> {
    match chunk.constant(idx) {
        Value::Object(o) => o.clone(),
        other => unreachable!("name-constant operand did not point at a string: {other:?}"),
    }
}

/// Bool -> Number coercion shared by comparisons and arithmetic:
/// `{Num,Num},{Bool,Bool},{Bool,Num},{Num,Bool}`, everything else `None`.
fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ok(source: &str) {
        let mut vm = Vm::new();
        match vm.interpret_source(source, "<test>") {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(errs) => panic!("compile error: {errs:?}"),
            InterpretResult::RuntimeError(e) => panic!("runtime error: {e}"),
        }
    }

    #[test]
    fn addition_and_string_concatenation() {
        run_ok("print 1 + 2;");
        run_ok(r#"print "foo" + "bar";"#);
    }

    #[test]
    fn block_scoping_shadows_and_restores_outer_binding() {
        run_ok("var a = 1; { var a = 2; print a; } print a;");
    }

    #[test]
    fn bool_coerces_to_number_under_add() {
        run_ok("print true + 1;");
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let mut vm = Vm::new();
        match vm.interpret_source("print a;", "<test>") {
            InterpretResult::RuntimeError(e) => {
                assert!(e.message.contains("Undefined variable 'a'"));
            }
            other => panic!("expected a runtime error, got a result with exit code {}", other.exit_code()),
        }
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        run_ok("print 1 < 2 == true;");
    }

    #[test]
    fn functions_call_and_return_values() {
        run_ok("fun add(a, b) { return a + b; } print add(1, 2);");
    }

    #[test]
    fn while_loop_executes_to_completion() {
        run_ok("var i = 0; while (i < 5) { i = i + 1; } print i;");
    }

    #[test]
    fn map_literal_supports_subscript_and_field_access() {
        run_ok("var m = { 10, 20 }; print m.foo;");
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let mut vm = Vm::new();
        match vm.interpret_source("fun f(a) { return a; } f(1, 2);", "<test>") {
            InterpretResult::RuntimeError(e) => {
                assert!(e.message.contains("Expected 1 arguments but got 2"));
            }
            other => panic!("expected a runtime error, exit code {}", other.exit_code()),
        }
    }

    #[test]
    fn clock_native_is_callable_and_returns_a_number() {
        run_ok("print clock() >= 0;");
    }

    #[test]
    fn clone_child_shares_globals_with_parent() {
        let mut vm = Vm::new();
        vm.define_global("shared", Value::Number(42.0));
        let mut child = vm.clone_child();
        run_ok_on(&mut child, "print shared;");
    }

    fn run_ok_on(vm: &mut Vm, source: &str) {
        match vm.interpret_source(source, "<test>") {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(errs) => panic!("compile error: {errs:?}"),
            InterpretResult::RuntimeError(e) => panic!("runtime error: {e}"),
        }
    }

    /// `GETI`/`SETI` have no surface syntax to reach them from, so they
    /// are exercised by hand-building a chunk: push a two-element map
    /// literal, push a numeric key, `GETI`.
    fn hand_built_script(build: impl FnOnce(&mut Chunk)) -> wisp_core::WispFunction {
        let source = Rc::new(wisp_core::Source {
            filename: "<hand-built>".to_string(),
            text: String::new(),
        });
        let mut chunk = Chunk::new(source);
        build(&mut chunk);
        chunk.emit_op(OpCode::Nil, 1, 1);
        chunk.emit_op(OpCode::Ret, 1, 1);
        wisp_core::WispFunction {
            name: None,
            arity: 0,
            chunk,
        }
    }

    #[test]
    fn geti_looks_up_a_map_literal_element_by_numeric_index() {
        let function = hand_built_script(|chunk| {
            let ten = chunk.add_constant(Value::Number(10.0), true);
            let twenty = chunk.add_constant(Value::Number(20.0), true);
            let key = chunk.add_constant(Value::Number(1.0), true);
            chunk.emit_op(OpCode::Const, 1, 1);
            chunk.emit(ten as u8, 1, 1);
            chunk.emit_op(OpCode::Const, 1, 1);
            chunk.emit(twenty as u8, 1, 1);
            chunk.emit_op(OpCode::Map, 1, 1);
            chunk.emit(2, 1, 1);
            chunk.emit_op(OpCode::Const, 1, 1);
            chunk.emit(key as u8, 1, 1);
            chunk.emit_op(OpCode::Geti, 1, 1);
            chunk.emit_op(OpCode::Print, 1, 1);
            chunk.emit(1, 1, 1);
        });
        let mut vm = Vm::new();
        match vm.interpret_function(function) {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(errs) => panic!("compile error: {errs:?}"),
            InterpretResult::RuntimeError(e) => panic!("runtime error: {e}"),
        }
    }

    #[test]
    fn seti_then_geti_round_trips_a_string_key() {
        let function = hand_built_script(|chunk| {
            let key = {
                let bytes = b"name".to_vec().into_boxed_slice();
                let hash = wisp_core::table::fnv1a(&bytes);
                Value::Object(Rc::new(Object::Str(wisp_core::WispString::new(bytes, hash))))
            };
            let key_idx = chunk.add_constant(key, false);
            let value_idx = chunk.add_constant(Value::Number(7.0), true);

            chunk.emit_op(OpCode::Map, 1, 1);
            chunk.emit(0, 1, 1);
            chunk.emit_op(OpCode::Const, 1, 1);
            chunk.emit(key_idx as u8, 1, 1);
            chunk.emit_op(OpCode::Const, 1, 1);
            chunk.emit(value_idx as u8, 1, 1);
            chunk.emit_op(OpCode::Seti, 1, 1);
            chunk.emit_op(OpCode::Pop, 1, 1);
        });
        let mut vm = Vm::new();
        match vm.interpret_function(function) {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(errs) => panic!("compile error: {errs:?}"),
            InterpretResult::RuntimeError(e) => panic!("runtime error: {e}"),
        }
    }
}
