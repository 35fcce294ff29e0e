//! # Service identity and type-erased instances.
//!
//! [`ServiceType`] is the map key used everywhere: a `TypeId` plus the type name
//! for messages. [`Instance`] carries a live `Arc<T>` across the type-erased
//! proxy/consumer boundary and hands it back out with [`Instance::get`].
//!
//! Trait objects are first-class service types:
//! ```rust
//! use std::sync::Arc;
//! use lazylink::{Instance, ServiceType};
//!
//! trait Clock: Send + Sync { fn now(&self) -> u64; }
//! struct Fixed;
//! impl Clock for Fixed { fn now(&self) -> u64 { 42 } }
//!
//! let svc: Arc<dyn Clock> = Arc::new(Fixed);
//! let inst = Instance::new(svc);
//! assert_eq!(inst.service_type(), ServiceType::of::<dyn Clock>());
//! assert_eq!(inst.get::<dyn Clock>().map(|c| c.now()), Some(42));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque, comparable identifier for a service contract.
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    /// Token for `T` (sized types and trait objects alike).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, for logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this token identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({})", self.name)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A live service instance with its type erased.
///
/// Holds an `Arc<T>` behind `dyn Any`; cloning is cheap.
#[derive(Clone)]
pub struct Instance {
    ty: ServiceType,
    value: Arc<dyn Any + Send + Sync>,
    // address of the wrapped service, shared by every handle built from it
    addr: usize,
}

impl Instance {
    /// Wraps a live service.
    pub fn new<T: ?Sized + Send + Sync + 'static>(service: Arc<T>) -> Self {
        let addr = Arc::as_ptr(&service) as *const () as usize;
        Self {
            ty: ServiceType::of::<T>(),
            value: Arc::new(service),
            addr,
        }
    }

    /// Type token of the wrapped service.
    pub fn service_type(&self) -> ServiceType {
        self.ty
    }

    /// Recovers the service if it is a `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Returns `true` if both handles wrap the same live service.
    ///
    /// Handles built separately from clones of one `Arc` are the same instance.
    pub fn same(&self, other: &Instance) -> bool {
        self.ty == other.ty && self.addr == other.addr
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("ty", &self.ty).finish()
    }
}
