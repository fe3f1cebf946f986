//! Host-provided builtins: a single `clock` builtin.

use std::time::Instant;

use wisp_core::{NativeFunction, Value};

/// `clock()` — seconds elapsed since `origin`, as a `Number`. The origin is
/// implementation-defined; this uses the instant the owning VM was
/// created, which is monotonic and trivially available without a
/// `lazy_static`/`OnceLock` process-wide origin.
pub fn clock(origin: Instant) -> NativeFunction {
    NativeFunction {
        name: "clock",
        arity: 0,
        func: Box::new(move |args: &[Value]| {
            if !args.is_empty() {
                return Err(format!(
                    "Expected 0 arguments but got {}.",
                    args.len()
                ));
            }
            Ok(Value::Number(origin.elapsed().as_secs_f64()))
        }),
    }
}
