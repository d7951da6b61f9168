//! Type-erased command, transaction and event values
//!
//! Commands, transactions and events are plain Rust values. The executor never
//! inspects them; it only needs their runtime type to find a handler and their
//! type name for diagnostics.

use std::any::{Any, TypeId};
use std::fmt;

/// A value that can travel through a unit of work
///
/// Implemented for every `'static + Send + Debug` type. Always call the
/// methods on a `&dyn Payload` (deref a `Box<dyn Payload>` first): calling them
/// on the box itself would describe the box, not the value inside it.
pub trait Payload: Any + Send + fmt::Debug {
    /// Borrow as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Fully qualified name of the concrete type
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + fmt::Debug> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl dyn Payload {
    /// Runtime type of the boxed value, the dispatch key of every registry
    pub fn payload_type(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Payload>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Debug-build check that `T` is not itself a `Box<dyn Payload>`
///
/// The blanket impl makes a boxed payload a payload too; boxing it again would
/// dispatch on the box type and never reach a handler. Boxed values go through
/// the `*_boxed` methods instead.
pub(crate) fn debug_assert_unboxed<T: Payload>() {
    debug_assert!(
        TypeId::of::<T>() != TypeId::of::<Box<dyn Payload>>(),
        "boxed payload passed by value, use the *_boxed variant"
    );
}

/// Short type name (last path segment) for log fields
pub(crate) fn short_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    match base.rfind("::") {
        Some(idx) => &type_name[idx + 2..],
        None => type_name,
    }
}
