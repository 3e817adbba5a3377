//! Callbacks through which a component receives container collaborators.
//!
//! Each is invoked once, right after construction and before autowiring,
//! when the component's binding registers the matching capability.
//! Setters take `&self`; components keep the value behind interior
//! mutability (`OnceCell`, `Mutex`, ...).

use super::container::Context;
use super::holder::ContextHolder;
use super::instance::WeakInstance;
use crate::descriptor::{MetadataMarker, TypeDescriptor};
use crate::messaging::EventBus;
use std::sync::Arc;

pub trait ContextAware: Send + Sync {
    fn set_context(&self, context: Context);
}

pub trait HolderAware: Send + Sync {
    fn set_holder(&self, holder: Arc<dyn ContextHolder>);
}

pub trait EventBusAware: Send + Sync {
    fn set_event_bus(&self, event_bus: EventBus);
}

/// Receives the marker that made the type a component.
pub trait MetadataAware: Send + Sync {
    fn set_metadata(&self, metadata: Arc<MetadataMarker>);
}

pub trait BeanNameAware: Send + Sync {
    fn set_bean_name(&self, name: &str);
}

/// Receives the descriptor of the component's own type.
pub trait MarkedAware: Send + Sync {
    fn set_marked(&self, marked: Arc<TypeDescriptor>);
}

/// Receives a handle to the final, possibly proxied, instance.
pub trait SelfAware: Send + Sync {
    fn set_self(&self, this: WeakInstance);
}
