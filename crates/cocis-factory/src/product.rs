//! Product capability trait and shared instance handles

use crate::registry::Policy;
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Capability set every factory product exposes
///
/// Callers of [`FactoryRegistry::create`](crate::FactoryRegistry::create)
/// see products only through this trait; the concrete type behind a name is
/// chosen by the registered constructor and never named at the call site.
///
/// # Example
/// ```
/// use cocis_factory::{product, Product};
/// use std::any::Any;
///
/// #[derive(Debug, PartialEq)]
/// struct Counter(u64);
///
/// impl Product for Counter {
///     fn kind(&self) -> &str {
///         "counter"
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn value_eq(&self, other: &dyn Product) -> bool {
///         product::value_eq(self, other)
///     }
/// }
/// ```
pub trait Product: Debug + Send + Sync + 'static {
    /// Product kind, stable across instances of one concrete type
    fn kind(&self) -> &str;

    /// Type-erased view for callers that own the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Value equality against another product
    ///
    /// Usually implemented with [`value_eq`].
    fn value_eq(&self, other: &dyn Product) -> bool;

    /// Human-readable one-line summary
    fn summary(&self) -> String {
        format!("{self:?}")
    }
}

/// Value equality helper for [`Product::value_eq`]
///
/// Products of different concrete types are never equal.
pub fn value_eq<T: PartialEq + 'static>(this: &T, other: &dyn Product) -> bool {
    other
        .as_any()
        .downcast_ref::<T>()
        .is_some_and(|other| other == this)
}

/// Shared, immutable handle to a factory product
///
/// # Equality
/// - Instance-controlled products (`Cached`, `Singleton`): equality is
///   identity, `a == b` exactly when both handles share one allocation.
/// - `Fresh` products: equality is value equality.
#[derive(Clone)]
pub struct Instance {
    product: Arc<dyn Product>,
    policy: Policy,
}

impl Instance {
    pub(crate) fn new(product: Arc<dyn Product>, policy: Policy) -> Self {
        Self { product, policy }
    }

    /// Policy the product was created under
    #[inline]
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Whether equality coincides with identity for this product
    #[inline]
    #[must_use]
    pub fn is_instance_controlled(&self) -> bool {
        self.policy.is_instance_controlled()
    }

    /// Check if both handles share one allocation
    #[inline]
    #[must_use]
    pub fn same_instance(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.product).cast::<()>(),
            Arc::as_ptr(&other.product).cast::<()>(),
        )
    }

    /// Concrete view, for callers that know the product type
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Product>(&self) -> Option<&T> {
        self.product.as_any().downcast_ref::<T>()
    }

    /// Shared product pointer
    #[inline]
    #[must_use]
    pub fn as_arc(&self) -> &Arc<dyn Product> {
        &self.product
    }
}

impl Deref for Instance {
    type Target = dyn Product;

    fn deref(&self) -> &Self::Target {
        self.product.as_ref()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        if self.is_instance_controlled() || other.is_instance_controlled() {
            self.same_instance(other)
        } else {
            self.same_instance(other) || self.product.value_eq(other.product.as_ref())
        }
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("kind", &self.product.kind())
            .field("policy", &self.policy)
            .field("product", &self.product)
            .finish()
    }
}
