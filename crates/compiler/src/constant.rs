//! Useful constants for use within the compiler.

/// The bit width of the GIMPLE integer type that maps to a 32-bit runtime
/// integer.
pub const INTEGER_32_WIDTH: u32 = 32;

/// The bit width of the GIMPLE integer type that maps to a 64-bit runtime
/// integer.
pub const INTEGER_64_WIDTH: u32 = 64;

/// The bit width of the only GIMPLE real type that the runtime supports.
pub const DOUBLE_WIDTH: u32 = 64;

/// The message of the panic emitted when control flows off the end of a
/// function that should return a value.
pub const MISSING_RETURN_MESSAGE: &str = "control reached end of non-void function";

/// The name given to the variable that holds a function's return value.
pub const RETURN_SLOT_NAME: &str = "<retval>";
