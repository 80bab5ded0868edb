mod introspection;

pub use introspection::*;
