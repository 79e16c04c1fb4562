//! Cloud assembly output
//!
//! Renders synthesized stacks and writes them, together with a
//! `manifest.json` index, into an output directory.

use crate::error::{Error, Result};
use crate::stack::SynthesizedStack;
use crate::template::Template;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Version stamped into `manifest.json`
pub const MANIFEST_VERSION: &str = "1";

/// Template rendering format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl OutputFormat {
    /// File extension for rendered templates
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

/// Render one template.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the serializer fails.
pub fn render(template: &Template, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(template).map_err(Error::serialization)?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Yaml => serde_yaml::to_string(template).map_err(Error::serialization),
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    version: &'static str,
    stacks: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry<'a> {
    name: &'a str,
    description: &'a str,
    template_file: String,
    resource_count: usize,
}

/// Writes synthesized stacks into an output directory.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    out_dir: PathBuf,
    format: OutputFormat,
}

impl CloudAssembly {
    /// Create an assembly writer for `out_dir`
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            out_dir: out_dir.into(),
            format,
        }
    }

    /// File name of a stack's template
    #[must_use]
    pub fn template_file(&self, stack_name: &str) -> String {
        format!("{stack_name}.template.{}", self.format.extension())
    }

    /// Render every stack and write the templates plus `manifest.json`.
    ///
    /// All templates are rendered before anything is written, so a
    /// serialization failure leaves the directory untouched.
    ///
    /// # Errors
    ///
    /// Returns a serialization or I/O error.
    pub fn write(&self, stacks: &[SynthesizedStack]) -> Result<Vec<PathBuf>> {
        let rendered = stacks
            .iter()
            .map(|stack| Ok((self.template_file(&stack.name), render(&stack.template, self.format)?)))
            .collect::<Result<Vec<_>>>()?;

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            stacks: stacks
                .iter()
                .map(|stack| ManifestEntry {
                    name: &stack.name,
                    description: stack.description,
                    template_file: self.template_file(&stack.name),
                    resource_count: stack.template.resources.len(),
                })
                .collect(),
        };
        let manifest = serde_json::to_string_pretty(&manifest).map_err(Error::serialization)?;

        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| Error::io(e, &self.out_dir, "create directory"))?;

        let mut written = Vec::with_capacity(rendered.len() + 1);
        for (file, content) in rendered {
            let path = self.out_dir.join(file);
            write_file(&path, &content)?;
            written.push(path);
        }
        let manifest_path = self.out_dir.join("manifest.json");
        write_file(&manifest_path, &manifest)?;
        written.push(manifest_path);

        tracing::info!(
            out_dir = %self.out_dir.display(),
            stacks = stacks.len(),
            "Cloud assembly written"
        );
        Ok(written)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| Error::io(e, path, "write"))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Resource;
    use serde_json::json;
    use tempfile::TempDir;

    fn stack(name: &str) -> SynthesizedStack {
        let mut template = Template::new("desc");
        template
            .add_resource("Topic", Resource::new("AWS::SNS::Topic", json!({})))
            .unwrap();
        SynthesizedStack {
            name: name.to_string(),
            description: "A stack",
            template,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_yaml() {
        let yaml = render(&stack("s").template, OutputFormat::Yaml).unwrap();
        let parsed: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(parsed["Resources"]["Topic"]["Type"], "AWS::SNS::Topic");
    }

    #[test]
    fn test_write_assembly() {
        let dir = TempDir::new().unwrap();
        let assembly = CloudAssembly::new(dir.path().join("cdk.out"), OutputFormat::Json);
        let written = assembly
            .write(&[stack("pipeline"), stack("classesAPI-test")])
            .unwrap();
        assert_eq!(written.len(), 3);

        let template: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("cdk.out/pipeline.template.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(template["Resources"]["Topic"]["Type"], "AWS::SNS::Topic");

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("cdk.out/manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["version"], "1");
        assert_eq!(manifest["stacks"][1]["name"], "classesAPI-test");
        assert_eq!(
            manifest["stacks"][1]["templateFile"],
            "classesAPI-test.template.json"
        );
        assert_eq!(manifest["stacks"][0]["resourceCount"], 1);
    }
}
