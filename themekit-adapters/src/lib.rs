//! Built-in tool adapters.
//!
//! Every adapter wraps one tool behind [`ToolAdapter`]. [`register_builtin`]
//! installs all of them under their tags.

pub mod archive;
pub mod bundle;
pub mod fs_ops;
pub mod keywords;
pub mod lint;
pub mod minify;
pub mod pot;
pub mod sass;
pub mod screen;
pub mod textdomain;
pub mod watch;

mod support;

use std::sync::Arc;

use themekit_core::adapter::ToolAdapter;
use themekit_core::registry::TaskRegistry;

pub use archive::ArchiveAdapter;
pub use bundle::BundleAdapter;
pub use fs_ops::{CleanAdapter, CopyAdapter};
pub use keywords::DEFAULT_KEYWORDS;
pub use lint::StyleLintAdapter;
pub use minify::{CssMinifyAdapter, JsMinifyAdapter};
pub use pot::MakePotAdapter;
pub use sass::SassAdapter;
pub use screen::ScreenAdapter;
pub use textdomain::TextDomainAdapter;
pub use watch::WatchAdapter;

/// Every built-in adapter.
pub fn builtin_adapters() -> Vec<Arc<dyn ToolAdapter>> {
    vec![
        Arc::new(SassAdapter),
        Arc::new(BundleAdapter),
        Arc::new(StyleLintAdapter),
        Arc::new(JsMinifyAdapter),
        Arc::new(CssMinifyAdapter),
        Arc::new(CopyAdapter),
        Arc::new(CleanAdapter),
        Arc::new(ArchiveAdapter),
        Arc::new(MakePotAdapter),
        Arc::new(TextDomainAdapter),
        Arc::new(ScreenAdapter),
        Arc::new(WatchAdapter),
    ]
}

/// Registers every built-in adapter under its tool tag.
pub fn register_builtin(registry: &mut TaskRegistry) {
    for adapter in builtin_adapters() {
        registry.register_adapter(adapter.tool(), adapter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themekit_core::options::CleanOptions;
    use themekit_core::task::AdapterConfig;

    #[test]
    fn test_tags_match_config_tags() {
        let mut registry = TaskRegistry::new();
        register_builtin(&mut registry);
        let tag = AdapterConfig::Clean(CleanOptions::default()).tag().to_string();
        assert_eq!(registry.adapter(&tag).map(|a| a.tool()), Some("clean"));
        assert_eq!(registry.adapters().registered_tags().len(), 12);
    }
}
