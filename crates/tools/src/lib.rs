//! The Tool Registry (spec §4.1): declaring tools with a [`vellum_core::Schema`],
//! normalizing and validating arguments against it, and invoking one or many
//! tool calls sequentially or with bounded parallelism.

mod accessors;
mod registry;

pub use accessors::{get_array, get_bool, get_f64, get_i64, get_object, get_string};
pub use registry::{
    normalize_arguments, CallOutcome, InvocationStrategy, PendingCall, Tool, ToolDescriptor,
    ToolRegistry,
};
