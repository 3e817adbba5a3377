//! Qualified names of the markers and wrapper types the container
//! understands.

pub const COMPONENT: &str = "meshestra.context.annotation.Component";
pub const SUPPLIER: &str = "meshestra.context.annotation.Supplier";
pub const CONFIGURATION: &str = "meshestra.context.annotation.Configuration";
pub const SERIALIZATION: &str = "meshestra.context.annotation.Serialization";

pub const NAMED: &str = "meshestra.context.annotation.Named";
pub const SCOPE: &str = "meshestra.context.annotation.Scope";
pub const ENVIRONMENT: &str = "meshestra.context.annotation.Environment";
pub const DEPENDS_ON: &str = "meshestra.context.annotation.DependsOn";

pub const AUTOWIRED: &str = "meshestra.context.annotation.Autowired";
pub const QUALIFIER: &str = "meshestra.context.annotation.Qualifier";
pub const NOT_NULL: &str = "meshestra.context.annotation.NotNull";

pub const SCAN: &str = "meshestra.context.annotation.Scan";
pub const REGISTER_FACTORY: &str = "meshestra.context.annotation.RegisterFactory";
pub const REGISTER_FACTORIES: &str = "meshestra.context.annotation.RegisterFactories";
pub const REGISTER_PROPERTY: &str = "meshestra.context.annotation.RegisterProperty";
pub const REGISTER_PROPERTIES: &str = "meshestra.context.annotation.RegisterProperties";

/// Parameter wrapper receiving the bean handle instead of its instance.
pub const BEAN: &str = "meshestra.context.Bean";
/// Parameter wrapper deferring creation until first access.
pub const LAZY: &str = "meshestra.context.Lazy";
pub const LIST: &str = "java.util.List";
pub const MAP: &str = "java.util.Map";

/// Interface serialization components implement.
pub const CODEC: &str = "meshestra.context.Codec";

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";

/// Types a `Map` parameter may use as its key: anything a string is
/// assignable to.
pub const MAP_KEY_TYPES: &[&str] = &[
    STRING,
    OBJECT,
    "java.lang.CharSequence",
    "java.lang.Comparable",
    "java.io.Serializable",
    "java.lang.constant.Constable",
    "java.lang.constant.ConstantDesc",
];

/// Markers that are components without needing to resolve their own type.
pub(crate) fn is_builtin_component(type_name: &str) -> bool {
    type_name == COMPONENT || type_name == SUPPLIER
}
