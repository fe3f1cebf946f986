//! Compile-time local variable bookkeeping.

/// A declared local variable's name and scope depth. `depth == -1` marks
/// "declared but not yet initialized," which lets `resolve_local` catch a
/// variable referencing itself inside its own initializer.
pub struct Local {
    pub name: String,
    pub depth: i32,
}
