//! The test API surface commands are mounted on.
//!
//! Commands live under dotted paths (`"get_text"`, `"assert.visible"`).
//! Namespaces are created on demand; nested lookups delegate segment by
//! segment to the parent namespace's resolver.

use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::CommandError;
use crate::pipeline::CommandWrapper;

#[derive(Default)]
struct Namespace {
    commands: DashMap<String, Arc<CommandWrapper>>,
    children: DashMap<String, Arc<Namespace>>,
}

impl Namespace {
    fn mount(&self, segments: &[&str], wrapper: Arc<CommandWrapper>) {
        match segments {
            [name] => {
                self.commands.insert((*name).to_string(), wrapper);
            }
            [namespace, rest @ ..] => {
                let child = self
                    .children
                    .entry((*namespace).to_string())
                    .or_insert_with(|| Arc::new(Namespace::default()))
                    .clone();
                child.mount(rest, wrapper);
            }
            [] => unreachable!("mount path segments validated by the surface"),
        }
    }

    fn resolve(&self, segments: &[&str]) -> Option<Arc<CommandWrapper>> {
        match segments {
            [name] => self.commands.get(*name).map(|entry| Arc::clone(&entry)),
            [namespace, rest @ ..] => self
                .children
                .get(*namespace)
                .and_then(|child| child.resolve(rest)),
            [] => None,
        }
    }

    fn collect(&self, prefix: &str, out: &mut Vec<String>) {
        for entry in self.commands.iter() {
            out.push(format!("{prefix}{}", entry.key()));
        }
        for child in self.children.iter() {
            child
                .value()
                .collect(&format!("{prefix}{}.", child.key()), out);
        }
    }
}

pub struct ApiSurface {
    root: Namespace,
}

impl ApiSurface {
    pub fn new() -> Self {
        Self {
            root: Namespace::default(),
        }
    }

    /// Mounts a command wrapper under a dotted path, creating intermediate
    /// namespaces on demand. Remounting an existing path replaces the
    /// wrapper.
    pub fn mount(&self, path: &str, wrapper: Arc<CommandWrapper>) -> Result<(), CommandError> {
        let segments = Self::segments(path)?;
        self.root.mount(&segments, wrapper);
        Ok(())
    }

    pub fn resolve(&self, path: &str) -> Option<Arc<CommandWrapper>> {
        let segments = Self::segments(path).ok()?;
        self.root.resolve(&segments)
    }

    /// Every mounted command as a dotted path, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.root.collect("", &mut names);
        names.sort();
        names
    }

    fn segments(path: &str) -> Result<Vec<&str>, CommandError> {
        let segments: Vec<&str> = path.split('.').collect();
        if path.is_empty() || segments.iter().any(|segment| segment.is_empty()) {
            return Err(CommandError::MountPath(path.to_string()));
        }
        Ok(segments)
    }
}

impl Default for ApiSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CommandDefinition, CommandFn};
    use serde_json::Value;

    fn wrapper(name: &str) -> Arc<CommandWrapper> {
        let command: CommandFn = Arc::new(|_ctx, _args| Box::pin(async { Ok(Value::Null) }));
        CommandWrapper::create(name, CommandDefinition::Function(command), false)
    }

    #[test]
    fn mounts_and_resolves_flat_and_nested_paths() {
        let api = ApiSurface::new();
        api.mount("get_text", wrapper("get_text")).unwrap();
        api.mount("assert.visible", wrapper("visible")).unwrap();
        api.mount("assert.not.present", wrapper("present")).unwrap();

        assert!(api.resolve("get_text").is_some());
        assert!(api.resolve("assert.visible").is_some());
        assert!(api.resolve("assert.not.present").is_some());
        assert!(api.resolve("assert.missing").is_none());
        assert!(api.resolve("assert").is_none());
    }

    #[test]
    fn enumerates_mounted_commands_with_dotted_names() {
        let api = ApiSurface::new();
        api.mount("get_text", wrapper("get_text")).unwrap();
        api.mount("assert.visible", wrapper("visible")).unwrap();

        assert_eq!(api.command_names(), vec!["assert.visible", "get_text"]);
    }

    #[test]
    fn rejects_malformed_paths() {
        let api = ApiSurface::new();
        assert!(matches!(
            api.mount("", wrapper("x")),
            Err(CommandError::MountPath(_))
        ));
        assert!(matches!(
            api.mount("assert..visible", wrapper("x")),
            Err(CommandError::MountPath(_))
        ));
    }
}
