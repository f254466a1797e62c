use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;

/// Core component lifecycle trait for all kernel components
#[async_trait]
pub trait KernelComponent: Any + Send + Sync + Debug {
    fn name(&self) -> &'static str;
    async fn initialize(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Registry storing components as `Arc<dyn KernelComponent>`, keyed by the
/// concrete type's `TypeId`. Components are initialized and started in
/// registration order and stopped in reverse.
#[derive(Default, Debug)]
pub struct DependencyRegistry {
    instances: HashMap<TypeId, Arc<dyn KernelComponent>>,
    order: Vec<TypeId>,
}

impl DependencyRegistry {
    /// Create a new empty dependency registry
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a component instance, keyed by the TypeId of the concrete
    /// type V. Re-registering the same type replaces the instance but keeps
    /// its position in the lifecycle order.
    pub fn register_instance<V>(&mut self, instance: Arc<V>)
    where
        V: KernelComponent + 'static,
    {
        let type_id = TypeId::of::<V>();
        if self.instances.insert(type_id, instance).is_none() {
            self.order.push(type_id);
        }
    }

    /// Get a component instance by the TypeId of its concrete type.
    pub fn get_component_by_id(&self, type_id: &TypeId) -> Option<Arc<dyn KernelComponent>> {
        self.instances.get(type_id).cloned()
    }

    /// Get a component instance by concrete type T.
    /// Returns Arc<T> if found and downcast is successful.
    pub fn get_concrete<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        let type_id = TypeId::of::<T>();
        self.instances.get(&type_id).and_then(|arc_kc| {
            // KernelComponent: Any, so the Arc can be viewed as Any for the downcast
            let arc_any: Arc<dyn Any + Send + Sync> = arc_kc.clone();
            Arc::downcast::<T>(arc_any).ok()
        })
    }

    /// All registered components in registration order.
    pub fn components_in_order(&self) -> Vec<Arc<dyn KernelComponent>> {
        self.order
            .iter()
            .filter_map(|id| self.instances.get(id).cloned())
            .collect()
    }

    /// Get TypeIds of all registered components.
    pub fn get_registered_ids(&self) -> Vec<TypeId> {
        self.order.clone()
    }

    /// Clear all instances.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.order.clear();
    }
}
