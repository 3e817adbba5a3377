//! Host-side bindings for component types.
//!
//! A descriptor says what a component looks like; a [`TypeBinding`] says
//! how to build it. Bindings are keyed by the descriptor's qualified name
//! and carry the constructors, autowirable methods and capability casters
//! for one concrete Rust type.

use super::aware::{
    BeanNameAware, ContextAware, EventBusAware, HolderAware, MarkedAware, MetadataAware, SelfAware,
};
use super::autowire::AutowireArgs;
use crate::factory::Codec;
use crate::lifecycle::{Destroyable, Initializable};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased component instance.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Turns an [`Object`] into an `Arc<Arc<dyn Trait>>` wrapped as an `Object`,
/// or `None` when the object is not the bound type.
type CasterFn = Arc<dyn Fn(Object) -> Option<Object> + Send + Sync>;
type ConstructorFn = Arc<dyn Fn() -> Object + Send + Sync>;
type AutowiredConstructorFn = Arc<dyn Fn(&AutowireArgs) -> anyhow::Result<Object> + Send + Sync>;
type MethodFn = Arc<dyn Fn(&Object, &AutowireArgs) -> anyhow::Result<Option<Object>> + Send + Sync>;
type DecoderFn = Arc<dyn Fn(serde_json::Value) -> anyhow::Result<Object> + Send + Sync>;

pub struct TypeBinding {
    name: String,
    type_id: TypeId,
    rust_name: &'static str,
    constructor: Option<ConstructorFn>,
    autowired_constructor: Option<AutowiredConstructorFn>,
    methods: HashMap<String, MethodFn>,
    casters: HashMap<TypeId, CasterFn>,
    decoder: Option<DecoderFn>,
}

impl TypeBinding {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> TypeBindingBuilder<T> {
        TypeBindingBuilder::new(name)
    }

    /// Qualified name of the descriptor this binding serves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `TypeId` of the concrete Rust type.
    pub fn rust_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn has_autowired_constructor(&self) -> bool {
        self.autowired_constructor.is_some()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn can_decode(&self) -> bool {
        self.decoder.is_some()
    }

    /// Whether instances of this binding can be viewed as `U`.
    pub fn supports<U: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.casters.contains_key(&TypeId::of::<U>())
    }

    pub(crate) fn construct(&self) -> Option<Object> {
        self.constructor.as_ref().map(|ctor| ctor())
    }

    pub(crate) fn construct_autowired(&self, args: &AutowireArgs) -> Option<anyhow::Result<Object>> {
        self.autowired_constructor.as_ref().map(|ctor| ctor(args))
    }

    /// Calls the method registered under `name` on `target`.
    pub(crate) fn invoke(
        &self,
        name: &str,
        target: &Object,
        args: &AutowireArgs,
    ) -> Option<anyhow::Result<Option<Object>>> {
        self.methods.get(name).map(|method| method(target, args))
    }

    pub(crate) fn decode(&self, value: serde_json::Value) -> Option<anyhow::Result<Object>> {
        self.decoder.as_ref().map(|decoder| decoder(value))
    }

    pub(crate) fn cast<U: ?Sized + Send + Sync + 'static>(&self, object: &Object) -> Option<Arc<U>> {
        let caster = self.casters.get(&TypeId::of::<U>())?;
        let wrapped = caster(Arc::clone(object))?;
        wrapped.downcast::<Arc<U>>().ok().map(|it| it.as_ref().clone())
    }
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("TypeBinding")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .field("constructor", &self.constructor.is_some())
            .field("autowired_constructor", &self.autowired_constructor.is_some())
            .field("methods", &methods)
            .field("capabilities", &self.casters.len())
            .finish()
    }
}

/// Fluent builder for a [`TypeBinding`].
///
/// # Example
///
/// ```rust,ignore
/// let binding = TypeBindingBuilder::<UserService>::new("com.acme.UserService")
///     .autowired_constructor(|args| Ok(UserService::new(args.get::<UserRepository>(0)?)))
///     .autowired("setClock", |service, args| {
///         service.set_clock(args.get::<Clock>(0)?);
///         Ok(())
///     })
///     .provides::<dyn Service, _>(|it| it as Arc<dyn Service>)
///     .initializable()
///     .build();
/// ```
pub struct TypeBindingBuilder<T: Any + Send + Sync> {
    binding: TypeBinding,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeBindingBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let builder = Self {
            binding: TypeBinding {
                name: name.into(),
                type_id: TypeId::of::<T>(),
                rust_name: std::any::type_name::<T>(),
                constructor: None,
                autowired_constructor: None,
                methods: HashMap::new(),
                casters: HashMap::new(),
                decoder: None,
            },
            _marker: PhantomData,
        };
        builder.provides::<T, _>(|it| it)
    }

    /// No-argument constructor.
    pub fn constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.binding.constructor = Some(Arc::new(move || Arc::new(ctor()) as Object));
        self
    }

    /// Constructor taking autowired parameters.
    pub fn autowired_constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn(&AutowireArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.binding.autowired_constructor =
            Some(Arc::new(move |args| Ok(Arc::new(ctor(args)?) as Object)));
        self
    }

    /// Method invoked with autowired parameters after construction.
    pub fn autowired<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T, &AutowireArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.binding.methods.insert(
            name.into(),
            Arc::new(move |target, args| {
                method(receiver::<T>(target)?, args)?;
                Ok(None)
            }),
        );
        self
    }

    /// Method whose result becomes a bean of its own.
    pub fn supplies<R, F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&T, &AutowireArgs) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.binding.methods.insert(
            name.into(),
            Arc::new(move |target, args| {
                let product = method(receiver::<T>(target)?, args)?;
                Ok(Some(Arc::new(product) as Object))
            }),
        );
        self
    }

    /// Lets instances be viewed as `U`, typically a trait object.
    pub fn provides<U, F>(mut self, cast: F) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        let caster: CasterFn = Arc::new(move |object: Object| {
            let concrete = object.downcast::<T>().ok()?;
            let view: Arc<U> = cast(concrete);
            Some(Arc::new(view) as Object)
        });
        self.binding.casters.insert(TypeId::of::<U>(), caster);
        self
    }

    pub fn initializable(self) -> Self
    where
        T: Initializable,
    {
        self.provides::<dyn Initializable, _>(|it| it as Arc<dyn Initializable>)
    }

    pub fn destroyable(self) -> Self
    where
        T: Destroyable,
    {
        self.provides::<dyn Destroyable, _>(|it| it as Arc<dyn Destroyable>)
    }

    pub fn context_aware(self) -> Self
    where
        T: ContextAware,
    {
        self.provides::<dyn ContextAware, _>(|it| it as Arc<dyn ContextAware>)
    }

    pub fn holder_aware(self) -> Self
    where
        T: HolderAware,
    {
        self.provides::<dyn HolderAware, _>(|it| it as Arc<dyn HolderAware>)
    }

    pub fn event_bus_aware(self) -> Self
    where
        T: EventBusAware,
    {
        self.provides::<dyn EventBusAware, _>(|it| it as Arc<dyn EventBusAware>)
    }

    pub fn metadata_aware(self) -> Self
    where
        T: MetadataAware,
    {
        self.provides::<dyn MetadataAware, _>(|it| it as Arc<dyn MetadataAware>)
    }

    pub fn bean_name_aware(self) -> Self
    where
        T: BeanNameAware,
    {
        self.provides::<dyn BeanNameAware, _>(|it| it as Arc<dyn BeanNameAware>)
    }

    pub fn marked_aware(self) -> Self
    where
        T: MarkedAware,
    {
        self.provides::<dyn MarkedAware, _>(|it| it as Arc<dyn MarkedAware>)
    }

    pub fn self_aware(self) -> Self
    where
        T: SelfAware,
    {
        self.provides::<dyn SelfAware, _>(|it| it as Arc<dyn SelfAware>)
    }

    /// Marks the type as a serialization codec.
    pub fn codec(self) -> Self
    where
        T: Codec,
    {
        self.provides::<dyn Codec, _>(|it| it as Arc<dyn Codec>)
    }

    /// Allows configuration beans of this type to be decoded from files.
    pub fn deserializable(mut self) -> Self
    where
        T: DeserializeOwned,
    {
        self.binding.decoder = Some(Arc::new(|value| {
            let decoded: T = serde_json::from_value(value)?;
            Ok(Arc::new(decoded) as Object)
        }));
        self
    }

    pub fn build(self) -> Arc<TypeBinding> {
        Arc::new(self.binding)
    }
}

fn receiver<T: Any>(target: &Object) -> anyhow::Result<&T> {
    (**target).downcast_ref::<T>().ok_or_else(|| {
        anyhow::anyhow!(
            "method receiver is not a {}",
            std::any::type_name::<T>()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Default)]
    struct English {
        name: Mutex<String>,
    }

    impl Greeter for English {
        fn greet(&self) -> String {
            format!("Hello, {}", self.name.lock().unwrap())
        }
    }

    fn binding() -> Arc<TypeBinding> {
        TypeBindingBuilder::<English>::new("demo.English")
            .constructor(English::default)
            .autowired("setName", |this, _args| {
                *this.name.lock().unwrap() = "world".into();
                Ok(())
            })
            .supplies("shout", |this, _args| Ok(this.greet().to_uppercase()))
            .provides::<dyn Greeter, _>(|it| it as Arc<dyn Greeter>)
            .build()
    }

    #[test]
    fn test_construct_and_cast() {
        let binding = binding();
        assert!(binding.has_constructor());
        assert!(!binding.has_autowired_constructor());
        assert!(binding.supports::<dyn Greeter>());
        assert!(binding.supports::<English>());
        assert!(!binding.supports::<dyn Initializable>());

        let object = binding.construct().unwrap();
        assert_eq!((*object).type_id(), binding.rust_type_id());
        let greeter = binding.cast::<dyn Greeter>(&object).unwrap();
        assert_eq!(greeter.greet(), "Hello, ");
    }

    #[test]
    fn test_invoke_methods() {
        let binding = binding();
        let object = binding.construct().unwrap();
        let args = AutowireArgs::empty("demo.English", "setName");

        let unit = binding.invoke("setName", &object, &args).unwrap().unwrap();
        assert!(unit.is_none());

        let product = binding.invoke("shout", &object, &args).unwrap().unwrap().unwrap();
        assert_eq!(product.downcast_ref::<String>().unwrap(), "HELLO, WORLD");
        assert!(binding.invoke("missing", &object, &args).is_none());
    }

    #[test]
    fn test_wrong_receiver_is_an_error() {
        let binding = binding();
        let stranger: Object = Arc::new(5u32);
        let args = AutowireArgs::empty("demo.English", "setName");
        assert!(binding.invoke("setName", &stranger, &args).unwrap().is_err());
        assert!(binding.cast::<dyn Greeter>(&stranger).is_none());
    }

    #[test]
    fn test_decoder() {
        #[derive(serde::Deserialize)]
        struct Settings {
            port: u16,
        }

        let binding = TypeBindingBuilder::<Settings>::new("demo.Settings")
            .deserializable()
            .build();
        let object = binding
            .decode(serde_json::json!({ "port": 8080 }))
            .unwrap()
            .unwrap();
        assert_eq!(object.downcast_ref::<Settings>().unwrap().port, 8080);
    }
}
