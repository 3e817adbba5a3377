//! Archives and contexts assembled from class fixtures.

use super::{Context, ContextBuilder, StandardHolder, TypeRegistry, markers};
use crate::config::ConfigService;
use crate::descriptor::MemorySource;
use crate::descriptor::fixture::{ClassFixture, MarkerFixture, marker};
use std::path::Path;
use std::sync::Arc;

pub(crate) const ENTRY: &str = "com.acme.App";

/// A public class with a no-argument constructor and the given marker.
pub(crate) fn marked(name: &str, metadata: MarkerFixture) -> ClassFixture {
    ClassFixture::new(name).default_constructor().marker(metadata)
}

pub(crate) fn component(name: &str) -> ClassFixture {
    marked(name, marker(markers::COMPONENT))
}

pub(crate) fn archive(entry: ClassFixture, classes: &[ClassFixture]) -> MemorySource {
    let mut source = MemorySource::new("acme.jar");
    source.insert_class(ENTRY, entry.build());
    for class in classes {
        source.insert_class(class.name(), class.build());
    }
    source
}

/// Routes `tracing` output through the test harness. Safe to call from
/// every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn context_with(
    source: MemorySource,
    data_folder: &Path,
    types: TypeRegistry,
    config: ConfigService,
) -> Context {
    init_tracing();
    let holder = StandardHolder::new("acme", ENTRY, data_folder, Arc::new(source));
    ContextBuilder::new(Arc::new(holder))
        .config_service(config)
        .types(types)
        .build()
}

pub(crate) fn context(source: MemorySource, types: TypeRegistry) -> Context {
    context_with(source, Path::new("target/acme"), types, ConfigService::empty())
}

/// Runs initialize, load and enable.
pub(crate) fn start(context: &Context) -> crate::error::Result<()> {
    context.initialize()?;
    context.load()?;
    context.enable()
}
