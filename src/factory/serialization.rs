use super::component::{construct, validate_constructible};
use super::{BeanFactory, Codec, binding_for, simple_name};
use crate::di::markers;
use crate::di::{BeanDefinition, Context, Instance};
use crate::error::Result;
use tracing::warn;

/// Builds codec components. The marker's `value` is the file extension the
/// codec handles.
#[derive(Debug, Clone, Default)]
pub struct SerializationBeanFactory;

impl SerializationBeanFactory {
    pub fn new() -> Self {
        Self
    }
}

/// Extension a serialization definition declares, lower-cased.
pub(crate) fn declared_extension(definition: &BeanDefinition) -> Option<String> {
    definition
        .metadata()
        .str_value("value")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_ascii_lowercase)
}

impl BeanFactory for SerializationBeanFactory {
    fn metadata_type(&self) -> &str {
        markers::SERIALIZATION
    }

    fn validate(&self, context: &Context, definition: &BeanDefinition) -> Result<bool> {
        let label = simple_name(markers::SERIALIZATION);
        if declared_extension(definition).is_none() {
            warn!(
                "{}: '{}' declares no file extension, skip.",
                label,
                definition.marked().name()
            );
            return Ok(false);
        }
        let Some(binding) = binding_for(context, markers::SERIALIZATION, definition) else {
            return Ok(false);
        };
        if !binding.supports::<dyn Codec>() {
            warn!(
                "{}: binding {} of '{}' is not a codec, skip.",
                label,
                binding.rust_name(),
                definition.marked().name()
            );
            return Ok(false);
        }
        validate_constructible(context, markers::SERIALIZATION, definition)
    }

    fn create(&self, context: &Context, definition: &BeanDefinition) -> Result<Instance> {
        construct(context, markers::SERIALIZATION, definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::fixture::{ClassFixture, Value, marker};
    use crate::di::testing::{self, ENTRY, archive, marked};
    use crate::di::{Injectable, TypeBindingBuilder, TypeRegistry};
    use crate::factory::Codec;

    struct LinesCodec;

    impl Codec for LinesCodec {
        fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
            let text = std::str::from_utf8(bytes)?;
            Ok(text.lines().collect::<Vec<_>>().into())
        }
    }

    impl Injectable for LinesCodec {
        const TYPE_NAME: &'static str = "com.acme.LinesCodec";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| LinesCodec).codec()
        }
    }

    struct NotACodec;

    impl Injectable for NotACodec {
        const TYPE_NAME: &'static str = "com.acme.NotACodec";

        fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
            binding.constructor(|| NotACodec)
        }
    }

    fn serialization(extension: &str) -> crate::descriptor::fixture::MarkerFixture {
        marker(markers::SERIALIZATION).value("value", Value::Str(extension.into()))
    }

    #[test]
    fn test_validate_requires_extension_and_codec() {
        let classes = [
            marked("com.acme.LinesCodec", serialization(" Lines ")),
            marked("com.acme.NotACodec", serialization("txt")),
            ClassFixture::new("com.acme.Blank")
                .default_constructor()
                .marker(marker(markers::SERIALIZATION)),
        ];
        let types = TypeRegistry::new();
        types.register::<LinesCodec>().register::<NotACodec>();
        let context = testing::context(archive(ClassFixture::new(ENTRY), &classes), types);
        testing::start(&context).unwrap();

        let beans = context.beans();
        assert_eq!(beans.len(), 1);
        assert_eq!(beans[0].name(), "com.acme.LinesCodec");
        assert_eq!(declared_extension(beans[0].definition()).as_deref(), Some("lines"));

        let codec = beans[0].instance().unwrap().cast::<dyn Codec>().unwrap();
        assert_eq!(codec.decode(b"a\nb").unwrap(), serde_json::json!(["a", "b"]));
    }
}
