//! Template rendering

use std::path::Path;

use tracing::debug;

use crate::error::{LayrError, Result};
use crate::placeholder::PlaceholderResolver;

/// Renders a source file with placeholders substituted into a destination file
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Read `source`, substitute placeholders and write the result to
    /// `destination`, creating or truncating it.
    pub async fn render(
        &self,
        source: &Path,
        destination: &Path,
        resolver: &mut PlaceholderResolver,
    ) -> Result<()> {
        let content = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| LayrError::TemplateNotValid {
                path: source.to_path_buf(),
                reason: format!("cannot read template: {}", e),
            })?;

        let rendered = resolver.substitute(&content).await?;

        tokio::fs::write(destination, rendered)
            .await
            .map_err(|e| LayrError::TemplateNotValid {
                path: destination.to_path_buf(),
                reason: format!("cannot write destination: {}", e),
            })?;

        debug!(source = %source.display(), destination = %destination.display(), "rendered template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaceholderSet;

    fn resolver(cwd: &Path) -> PlaceholderResolver {
        let set = PlaceholderSet {
            constants: [("VAR".to_string(), "bar".to_string())].into(),
            ..Default::default()
        };
        PlaceholderResolver::new(set, cwd).unwrap()
    }

    #[tokio::test]
    async fn test_renders_placeholders() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("read.tpl");
        let destination = temp.path().join("out.txt");
        std::fs::write(&source, "foo::%VAR%::baz").unwrap();

        TemplateRenderer::new()
            .render(&source, &destination, &mut resolver(temp.path()))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "foo::bar::baz");
    }

    #[tokio::test]
    async fn test_truncates_existing_destination() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("short.tpl");
        let destination = temp.path().join("out.txt");
        std::fs::write(&source, "test").unwrap();
        std::fs::write(&destination, "a much longer previous content").unwrap();

        TemplateRenderer::new()
            .render(&source, &destination, &mut resolver(temp.path()))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "test");
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        let result = TemplateRenderer::new()
            .render(
                &temp.path().join("not-available"),
                &temp.path().join("out"),
                &mut resolver(temp.path()),
            )
            .await;

        assert!(matches!(result, Err(LayrError::TemplateNotValid { .. })));
    }

    #[tokio::test]
    async fn test_missing_destination_directory() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("read.tpl");
        std::fs::write(&source, "content").unwrap();

        let result = TemplateRenderer::new()
            .render(
                &source,
                &temp.path().join("no/such/dir/out"),
                &mut resolver(temp.path()),
            )
            .await;

        match result {
            Err(LayrError::TemplateNotValid { path, .. }) => {
                assert!(path.ends_with("no/such/dir/out"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
