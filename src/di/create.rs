//! Instance creation pipeline.
//!
//! ```text
//! mark in progress → depends-on beans → factory.create → aware callbacks
//!   → autowired methods → factory.proxy → SelfAware → Initializable
//! ```

use super::aware::{
    BeanNameAware, ContextAware, EventBusAware, HolderAware, MarkedAware, MetadataAware, SelfAware,
};
use super::bean::{BeanDefinition, Building, Producer};
use super::container::{Context, ContextInner};
use super::instance::Instance;
use super::markers;
use crate::descriptor::{Annotated, MethodDescriptor, TypeDescriptor};
use crate::error::{ContextError, Result};
use crate::factory::BeanFactory;
use crate::lifecycle::Initializable;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, warn};

impl Context {
    /// Provider that creates instances of `definition` through `factory`.
    ///
    /// The provider holds the context weakly; it fails once the context is
    /// gone.
    pub(crate) fn producer(
        &self,
        factory: Arc<dyn BeanFactory>,
        definition: BeanDefinition,
    ) -> Producer {
        let context = Arc::downgrade(&self.inner);
        Arc::new(move || upgrade(&context)?.create_bean(factory.as_ref(), &definition))
    }

    /// Reports whether a marked type is in the creation guard. Holds the
    /// context weakly like [`Context::producer`].
    pub(crate) fn building(&self) -> Building {
        let context = Arc::downgrade(&self.inner);
        Arc::new(move |marked: &str| {
            context
                .upgrade()
                .is_some_and(|inner| inner.in_progress.lock().iter().any(|it| it == marked))
        })
    }

    /// Runs the full creation pipeline for one instance.
    pub(crate) fn create_bean(
        &self,
        factory: &dyn BeanFactory,
        definition: &BeanDefinition,
    ) -> Result<Instance> {
        let marked = definition.marked().name().to_string();
        {
            let mut in_progress = self.inner.in_progress.lock();
            if in_progress.contains(&marked) {
                return Err(ContextError::circular(format!(
                    "'{}' ({}) requested while being created, chain: {}",
                    definition.name(),
                    marked,
                    in_progress.join(" -> ")
                )));
            }
            in_progress.push(marked.clone());
        }

        let started = Instant::now();
        let mut created = None;
        let result = self.build_instance(factory, definition, &mut created);
        if let Some(instance) = created {
            self.inner
                .destruction
                .lock()
                .register_destroy(instance, definition.name());
        }
        if result.is_ok() {
            self.inner.in_progress.lock().retain(|it| *it != marked);
            debug!(
                bean = definition.name(),
                marked = %marked,
                "Created bean in {:?}",
                started.elapsed()
            );
        }
        result
    }

    fn build_instance(
        &self,
        factory: &dyn BeanFactory,
        definition: &BeanDefinition,
        created: &mut Option<Instance>,
    ) -> Result<Instance> {
        self.materialize_dependencies(definition)?;

        let step = Instant::now();
        let instance = factory.create(self, definition)?;
        self.check_instance(definition, &instance, "factory")?;
        *created = Some(instance.clone());
        debug!(bean = definition.name(), "create took {:?}", step.elapsed());

        self.inject_aware(definition, &instance);

        let step = Instant::now();
        self.autowire_methods(definition.marked(), &instance)?;
        debug!(bean = definition.name(), "autowire took {:?}", step.elapsed());

        let proxied = factory.proxy(self, definition, instance.clone())?;
        self.check_instance(definition, &proxied, "proxy")?;
        if proxied.concrete_type_id() != instance.concrete_type_id() {
            return Err(ContextError::wiring(format!(
                "proxy of bean '{}' changed its type from {} to {}",
                definition.name(),
                instance.binding().rust_name(),
                proxied.binding().rust_name()
            )));
        }
        *created = Some(proxied.clone());

        if let Some(aware) = proxied.cast::<dyn SelfAware>() {
            aware.set_self(proxied.downgrade());
        }
        if let Some(initializable) = proxied.cast::<dyn Initializable>() {
            let step = Instant::now();
            initializable.initialize()?;
            debug!(bean = definition.name(), "initialize took {:?}", step.elapsed());
        }
        Ok(proxied)
    }

    /// Creates the singletons `definition` declares it depends on.
    pub(crate) fn materialize_dependencies(&self, definition: &BeanDefinition) -> Result<()> {
        for name in definition.depends_on_beans() {
            let bean = self.bean(name).ok_or_else(|| {
                ContextError::wiring(format!(
                    "bean '{}' depends on missing bean '{}'",
                    definition.name(),
                    name
                ))
            })?;
            if bean.is_singleton() {
                bean.instance()?;
            }
        }
        Ok(())
    }

    /// The instance must be exactly the marked type.
    fn check_instance(
        &self,
        definition: &BeanDefinition,
        instance: &Instance,
        origin: &str,
    ) -> Result<()> {
        let marked = definition.marked().name();
        if instance.type_name() != marked || !instance.is_exact() {
            return Err(ContextError::wiring(format!(
                "{} produced a {} ({}) for bean '{}', expected {}",
                origin,
                instance.type_name(),
                instance.binding().rust_name(),
                definition.name(),
                marked
            )));
        }
        Ok(())
    }

    fn inject_aware(&self, definition: &BeanDefinition, instance: &Instance) {
        if let Some(aware) = instance.cast::<dyn ContextAware>() {
            aware.set_context(self.clone());
        }
        if let Some(aware) = instance.cast::<dyn HolderAware>() {
            aware.set_holder(Arc::clone(self.holder()));
        }
        if let Some(aware) = instance.cast::<dyn EventBusAware>() {
            aware.set_event_bus(self.event_bus().clone());
        }
        if let Some(aware) = instance.cast::<dyn MetadataAware>() {
            aware.set_metadata(Arc::clone(definition.metadata()));
        }
        if let Some(aware) = instance.cast::<dyn BeanNameAware>() {
            aware.set_bean_name(definition.name());
        }
        if let Some(aware) = instance.cast::<dyn MarkedAware>() {
            aware.set_marked(Arc::clone(definition.marked()));
        }
    }

    /// Invokes every public method marked `Autowired` on `marked` and its
    /// super classes, overrides first.
    fn autowire_methods(&self, marked: &Arc<TypeDescriptor>, instance: &Instance) -> Result<()> {
        for (owner, method) in autowired_methods(marked) {
            if method.access().is_static() {
                warn!(
                    "Autowired method {}#{} is static, skip.",
                    owner.name(),
                    method.name()
                );
                continue;
            }
            self.invoke(&owner, &method, instance)?;
        }
        Ok(())
    }

    /// Autowires the arguments of `method` and calls it on `instance`.
    pub(crate) fn invoke(
        &self,
        owner: &TypeDescriptor,
        method: &MethodDescriptor,
        instance: &Instance,
    ) -> Result<Option<super::binding::Object>> {
        let args = self.resolve_arguments(owner, method)?;
        let outcome = instance
            .binding()
            .invoke(method.name(), instance.object(), &args)
            .ok_or_else(|| {
                ContextError::wiring(format!(
                    "binding {} has no method '{}' declared by {}",
                    instance.binding().name(),
                    method.name(),
                    owner.name()
                ))
            })?;
        Ok(outcome?)
    }
}

pub(crate) fn upgrade(context: &Weak<ContextInner>) -> Result<Context> {
    context
        .upgrade()
        .map(Context::from_inner)
        .ok_or_else(|| ContextError::state("context has been dropped"))
}

/// Public methods of `marked` and its super classes, overrides first.
pub(crate) fn public_methods(
    marked: &Arc<TypeDescriptor>,
) -> Vec<(Arc<TypeDescriptor>, MethodDescriptor)> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let hierarchy = std::iter::once(Arc::clone(marked)).chain(marked.superclass_chain());
    for owner in hierarchy {
        for method in owner.methods() {
            if method.access().is_public() && seen.insert(method.signature_key()) {
                found.push((Arc::clone(&owner), method.clone()));
            }
        }
    }
    found
}

fn autowired_methods(marked: &Arc<TypeDescriptor>) -> Vec<(Arc<TypeDescriptor>, MethodDescriptor)> {
    public_methods(marked)
        .into_iter()
        .filter(|(_, method)| method.has_marker(markers::AUTOWIRED))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::fixture::{ClassFixture, MethodFixture, Value, marker};
    use crate::di::testing::{self, ENTRY, archive, component};
    use crate::di::{Injectable, Scope, Status, TypeBindingBuilder, TypeRegistry, WeakInstance};
    use crate::lifecycle::LifecycleError;
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Repository;

    impl Injectable for Repository {
        const TYPE_NAME: &'static str = "com.acme.Repository";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| Repository)
        }
    }

    struct Audit;

    impl Injectable for Audit {
        const TYPE_NAME: &'static str = "com.acme.Audit";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| Audit)
        }
    }

    struct Service {
        repository: Arc<Repository>,
        audit: OnceCell<Arc<Audit>>,
        name: OnceCell<String>,
        steps: Mutex<Vec<&'static str>>,
    }

    impl Injectable for Service {
        const TYPE_NAME: &'static str = "com.acme.Service";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding
                .autowired_constructor(|args| {
                    Ok(Service {
                        repository: args.get::<Repository>(0)?,
                        audit: OnceCell::new(),
                        name: OnceCell::new(),
                        steps: Mutex::new(Vec::new()),
                    })
                })
                .autowired("setAudit", |this, args| {
                    let _ = this.audit.set(args.get::<Audit>(0)?);
                    this.steps.lock().push("autowired");
                    Ok(())
                })
                .bean_name_aware()
                .initializable()
        }
    }

    impl BeanNameAware for Service {
        fn set_bean_name(&self, name: &str) {
            let _ = self.name.set(name.to_string());
            self.steps.lock().push("aware");
        }
    }

    impl Initializable for Service {
        fn initialize(&self) -> std::result::Result<(), LifecycleError> {
            if self.audit.get().is_none() {
                return Err(LifecycleError::init_failed("audit not wired"));
            }
            self.steps.lock().push("initialize");
            Ok(())
        }
    }

    fn types() -> TypeRegistry {
        let types = TypeRegistry::new();
        types
            .register::<Repository>()
            .register::<Audit>()
            .register::<Service>();
        types
    }

    fn autowired() -> crate::descriptor::fixture::MarkerFixture {
        marker(markers::AUTOWIRED)
    }

    fn service_classes() -> Vec<ClassFixture> {
        vec![
            component("com.acme.Repository"),
            component("com.acme.Audit"),
            ClassFixture::new("com.acme.BaseService")
                .method(MethodFixture::new("setAudit", "(Lcom/acme/Audit;)V").marker(autowired())),
            ClassFixture::new("com.acme.Service")
                .super_name("com.acme.BaseService")
                .marker(marker(markers::COMPONENT))
                .method(
                    MethodFixture::new("<init>", "(Lcom/acme/Repository;)V").marker(autowired()),
                )
                .method(MethodFixture::new("setAudit", "(Lcom/acme/Audit;)V").marker(autowired()))
                .method(
                    MethodFixture::new("configure", "(Lcom/acme/Audit;)V")
                        .static_method()
                        .marker(autowired()),
                ),
        ]
    }

    #[test]
    fn test_pipeline_wires_and_initializes() {
        let context = testing::context(archive(ClassFixture::new(ENTRY), &service_classes()), types());
        testing::start(&context).unwrap();

        let service = context.get::<Service>().unwrap().unwrap();
        let repository = context.get::<Repository>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&service.repository, &repository));
        assert!(service.audit.get().is_some());
        assert_eq!(service.name.get().map(String::as_str), Some("com.acme.Service"));
        // the override hides the base declaration, the static method is skipped
        assert_eq!(*service.steps.lock(), vec!["aware", "autowired", "initialize"]);
        assert_eq!(context.tracked_instances(), 3);
    }

    struct Left;
    struct Right;

    impl Injectable for Left {
        const TYPE_NAME: &'static str = "com.acme.Left";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.autowired_constructor(|args| {
                args.get::<Right>(0)?;
                Ok(Left)
            })
        }
    }

    impl Injectable for Right {
        const TYPE_NAME: &'static str = "com.acme.Right";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.autowired_constructor(|args| {
                args.get::<Left>(0)?;
                Ok(Right)
            })
        }
    }

    #[test]
    fn test_constructor_cycle_is_reported() {
        let needs = |name: &str, other: &str| {
            ClassFixture::new(name)
                .marker(marker(markers::COMPONENT))
                .method(MethodFixture::new("<init>", &format!("(L{other};)V")).marker(autowired()))
        };
        let classes = [
            needs("com.acme.Left", "com/acme/Right"),
            needs("com.acme.Right", "com/acme/Left"),
        ];
        let types = TypeRegistry::new();
        types.register::<Left>().register::<Right>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        context.initialize().unwrap();
        context.load().unwrap();

        assert!(matches!(
            context.enable(),
            Err(ContextError::CircularDependency { .. })
        ));
        assert_eq!(context.status(), Status::Error);
    }

    struct North;
    struct South;

    impl Injectable for North {
        const TYPE_NAME: &'static str = "com.acme.North";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding
                .constructor(|| {
                    std::thread::sleep(Duration::from_millis(100));
                    North
                })
                .autowired("setSouth", |_, args| args.get::<South>(0).map(drop))
        }
    }

    impl Injectable for South {
        const TYPE_NAME: &'static str = "com.acme.South";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding
                .constructor(|| {
                    std::thread::sleep(Duration::from_millis(100));
                    South
                })
                .autowired("setNorth", |_, args| args.get::<North>(0).map(drop))
        }
    }

    #[test]
    fn test_singleton_cycle_across_threads_fails_fast() {
        let classes = [
            component("com.acme.North")
                .method(MethodFixture::new("setSouth", "(Lcom/acme/South;)V").marker(autowired())),
            component("com.acme.South")
                .method(MethodFixture::new("setNorth", "(Lcom/acme/North;)V").marker(autowired())),
        ];
        let types = TypeRegistry::new();
        types.register::<North>().register::<South>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        context.initialize().unwrap();
        context.load().unwrap();

        let (sender, receiver) = mpsc::channel();
        for name in ["com.acme.North", "com.acme.South"] {
            let bean = context.bean(name).unwrap();
            let sender = sender.clone();
            std::thread::spawn(move || {
                let _ = sender.send(bean.instance());
            });
        }
        for _ in 0..2 {
            let result = receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("creation thread hung");
            assert!(matches!(result, Err(ContextError::CircularDependency { .. })));
        }
    }

    struct Sms;

    struct Notifier {
        sms: Option<Arc<Sms>>,
    }

    impl Injectable for Notifier {
        const TYPE_NAME: &'static str = "com.acme.Notifier";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.autowired_constructor(|args| {
                Ok(Notifier {
                    sms: args.optional::<Sms>(0)?,
                })
            })
        }
    }

    fn notifier_context(required: bool) -> Context {
        let mut constructor = MethodFixture::new("<init>", "(Lcom/acme/Sms;)V").marker(autowired());
        if required {
            constructor = constructor.param_marker(0, marker(markers::NOT_NULL));
        }
        let classes = [ClassFixture::new("com.acme.Notifier")
            .marker(marker(markers::COMPONENT))
            .method(constructor)];
        let types = TypeRegistry::new();
        types.register::<Notifier>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        context.initialize().unwrap();
        context.load().unwrap();
        context
    }

    #[test]
    fn test_unmatched_parameter_is_absent_unless_not_null() {
        let optional = notifier_context(false);
        optional.enable().unwrap();
        let notifier = optional.get::<Notifier>().unwrap().unwrap();
        assert!(notifier.sms.is_none());

        let required = notifier_context(true);
        assert!(matches!(required.enable(), Err(ContextError::Wiring { .. })));
        assert_eq!(required.status(), Status::Error);
    }

    #[test]
    fn test_prototype_creates_fresh_instances() {
        let classes = [component("com.acme.Repository").marker(
            marker(markers::SCOPE).value("value", Value::Str("prototype".into())),
        )];
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types());
        testing::start(&context).unwrap();

        let bean = context.bean("com.acme.Repository").unwrap();
        assert_eq!(bean.scope(), Scope::Prototype);
        assert!(!bean.is_materialized());
        let first = bean.instance().unwrap();
        let second = bean.instance().unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(context.tracked_instances(), 2);
    }

    static STARTED: std::sync::Mutex<Vec<&'static str>> = std::sync::Mutex::new(Vec::new());

    struct Cache;
    struct Mailer;

    impl Injectable for Cache {
        const TYPE_NAME: &'static str = "com.acme.Cache";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| Cache).initializable()
        }
    }

    impl Initializable for Cache {
        fn initialize(&self) -> std::result::Result<(), LifecycleError> {
            STARTED.lock().unwrap().push("cache");
            Ok(())
        }
    }

    impl Injectable for Mailer {
        const TYPE_NAME: &'static str = "com.acme.Mailer";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| Mailer).initializable()
        }
    }

    impl Initializable for Mailer {
        fn initialize(&self) -> std::result::Result<(), LifecycleError> {
            STARTED.lock().unwrap().push("mailer");
            Ok(())
        }
    }

    #[test]
    fn test_depends_on_beans_are_created_first() {
        let classes = [
            component("com.acme.Cache").marker(
                marker(markers::DEPENDS_ON).value("beans", Value::strings(&["com.acme.Mailer"])),
            ),
            component("com.acme.Mailer"),
        ];
        let types = TypeRegistry::new();
        types.register::<Cache>().register::<Mailer>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        testing::start(&context).unwrap();

        assert_eq!(*STARTED.lock().unwrap(), vec!["mailer", "cache"]);
    }

    const DECORATED: &str = "com.acme.Decorated";

    struct Greeting {
        text: String,
        this: OnceCell<WeakInstance>,
    }

    impl Greeting {
        fn new(text: impl Into<String>) -> Self {
            Self {
                text: text.into(),
                this: OnceCell::new(),
            }
        }
    }

    impl Injectable for Greeting {
        const TYPE_NAME: &'static str = "com.acme.Greeting";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.self_aware()
        }
    }

    impl SelfAware for Greeting {
        fn set_self(&self, this: WeakInstance) {
            let _ = self.this.set(this);
        }
    }

    /// Wraps greetings in brackets, or swaps them for another type.
    struct Decorating {
        swap_type: bool,
    }

    impl BeanFactory for Decorating {
        fn metadata_type(&self) -> &str {
            DECORATED
        }

        fn validate(&self, _context: &Context, _definition: &BeanDefinition) -> Result<bool> {
            Ok(true)
        }

        fn create(&self, _context: &Context, _definition: &BeanDefinition) -> Result<Instance> {
            Ok(Instance::new(Arc::new(Greeting::new("raw")), Greeting::binding()))
        }

        fn proxy(
            &self,
            _context: &Context,
            _definition: &BeanDefinition,
            instance: Instance,
        ) -> Result<Instance> {
            if self.swap_type {
                return Ok(Instance::new(Arc::new(Repository), Arc::clone(instance.binding())));
            }
            let raw = instance.downcast::<Greeting>().unwrap();
            let wrapped = Greeting::new(format!("[{}]", raw.text));
            Ok(Instance::new(Arc::new(wrapped), Arc::clone(instance.binding())))
        }
    }

    fn decorated_context(swap_type: bool) -> Context {
        let classes = [testing::marked("com.acme.Greeting", marker(DECORATED))];
        let types = TypeRegistry::new();
        types.register::<Greeting>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        context.initialize().unwrap();
        context
            .register_bean_factory(DECORATED, Arc::new(Decorating { swap_type }))
            .unwrap();
        context.load().unwrap();
        context
    }

    #[test]
    fn test_proxy_replaces_instance_and_is_self_aware() {
        let context = decorated_context(false);
        context.enable().unwrap();

        let greeting = context.bean("com.acme.Greeting").unwrap().instance().unwrap();
        let typed = greeting.downcast::<Greeting>().unwrap();
        assert_eq!(typed.text, "[raw]");
        let this = typed.this.get().unwrap().upgrade().unwrap();
        assert!(this.ptr_eq(&greeting));
    }

    #[test]
    fn test_proxy_changing_type_is_rejected() {
        let context = decorated_context(true);
        assert!(matches!(context.enable(), Err(ContextError::Wiring { .. })));
        assert_eq!(context.status(), Status::Error);
    }
}
