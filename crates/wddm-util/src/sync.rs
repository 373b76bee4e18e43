#[cfg(all(feature = "loom", test))]
pub(crate) use loom::sync::atomic::AtomicU32;
#[cfg(not(all(feature = "loom", test)))]
pub(crate) use std::sync::atomic::AtomicU32;
