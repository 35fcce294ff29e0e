//! # Consumer callbacks.
//!
//! A [`Consumer`] receives `(instance, type)` whenever a service it asked for
//! becomes available, and `(None, type)` when a live connection goes away.
//!
//! Identity is the shared callback itself: clones of one `Consumer` are the
//! same consumer for registration and unregistration, two separately built
//! consumers never are (even from identical closures).

use std::fmt;
use std::sync::Arc;

use crate::service::token::{Instance, ServiceType};

type ConsumerFn = dyn Fn(Option<&Instance>, ServiceType) + Send + Sync;

/// Shared resolution callback.
#[derive(Clone)]
pub struct Consumer(Arc<ConsumerFn>);

impl Consumer {
    /// Builds a consumer from an untyped callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Instance>, ServiceType) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Builds a consumer that receives `T` directly.
    ///
    /// Instances of any other type are delivered as `None`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use lazylink::{Consumer, Instance, ServiceType};
    ///
    /// let c = Consumer::typed::<String, _>(|svc, _ty| {
    ///     assert_eq!(svc.as_deref().map(String::as_str), Some("hi"));
    /// });
    /// c.accept(Some(&Instance::new(Arc::new("hi".to_string()))), ServiceType::of::<String>());
    /// ```
    pub fn typed<T, F>(f: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Option<Arc<T>>, ServiceType) + Send + Sync + 'static,
    {
        Self::new(move |instance, ty| f(instance.and_then(Instance::get::<T>), ty))
    }

    /// Invokes the callback.
    pub fn accept(&self, instance: Option<&Instance>, ty: ServiceType) {
        (self.0)(instance, ty);
    }

    /// Returns `true` if both handles are the same consumer.
    pub fn same(&self, other: &Consumer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Consumer {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Consumer {}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Consumer({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
