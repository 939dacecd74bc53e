use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::Result;
use themekit_core::fileset::ResolvedSet;
use themekit_core::task::AdapterConfig;

use crate::support::config_mismatch;

/// Prints a fixed banner.
pub struct ScreenAdapter;

impl ToolAdapter for ScreenAdapter {
    fn tool(&self) -> &'static str {
        "screen"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        _sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Screen(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        ctx.run.reporter().banner(&options.text, options.color);
        Ok(Outcome::Ok)
    }
}
