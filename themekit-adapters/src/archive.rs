//! Packaging resolved files into a zip archive.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use themekit_core::adapter::{Outcome, TaskContext, ToolAdapter};
use themekit_core::error::{Error, Result};
use themekit_core::fileset::ResolvedSet;
use themekit_core::options::{ArchiveMode, ArchiveOptions};
use themekit_core::task::AdapterConfig;

use crate::support::{config_mismatch, display_path};

pub struct ArchiveAdapter;

impl ToolAdapter for ArchiveAdapter {
    fn tool(&self) -> &'static str {
        "compress"
    }

    fn run(
        &self,
        config: &AdapterConfig,
        sets: &[ResolvedSet],
        ctx: &TaskContext<'_>,
    ) -> Result<Outcome> {
        let AdapterConfig::Archive(options) = config else {
            return Err(config_mismatch(self.tool(), config));
        };
        let ArchiveMode::Zip = options.mode;

        let count = write_zip(options, sets)?;
        ctx.run.reporter().ok(&format!(
            "Created {} ({} file(s)).",
            display_path(&options.archive, ctx.root()),
            count
        ));
        Ok(Outcome::Ok)
    }
}

/// Entry name of `relative` under `prefix`.
pub(crate) fn entry_name(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

fn zip_error(path: &Path, error: zip::result::ZipError) -> Error {
    Error::io(path, io::Error::new(io::ErrorKind::Other, error.to_string()))
}

fn write_zip(options: &ArchiveOptions, sets: &[ResolvedSet]) -> Result<usize> {
    let archive = &options.archive;
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let file = File::create(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = ZipWriter::new(file);
    let entry_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut count = 0usize;
    for file in sets.iter().flat_map(|s| s.files.iter()) {
        if file.source == *archive {
            continue;
        }
        let name = entry_name(&options.prefix, &file.relative);
        let bytes = fs::read(&file.source).map_err(|e| Error::io(&file.source, e))?;
        zip.start_file(name.as_str(), entry_options)
            .map_err(|e| zip_error(archive, e))?;
        zip.write_all(&bytes).map_err(|e| Error::io(archive, e))?;
        trace!("Added {}", name);
        count += 1;
    }

    zip.finish().map_err(|e| zip_error(archive, e))?;
    debug!("Wrote {} entries to {}", count, archive.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("bagan-html", "style.css"), "bagan-html/style.css");
        assert_eq!(entry_name("/bagan-html/", "js/a.js"), "bagan-html/js/a.js");
        assert_eq!(entry_name("", "a.txt"), "a.txt");
    }
}
