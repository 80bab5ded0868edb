use std::fmt::Debug;

/// Implementors return a snapshot of their internal state, for logging and assertions.
pub trait Introspect<T>
where
    T: Debug,
{
    fn introspect(&self) -> T;
}
