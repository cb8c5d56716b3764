//! Dependency resolution over declared plugin metadata.

use std::collections::HashSet;

use crate::{PluginError, Result};

/// Resolve the transitive dependencies of `root`.
///
/// `lookup` returns the declared dependencies of a registered plugin, or
/// `None` if the name is not registered. The result lists every dependency
/// before its dependents and excludes `root` itself.
pub fn resolve<F>(root: &str, lookup: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    let Some(direct) = lookup(root) else {
        return Err(PluginError::NotRegistered(root.to_string()));
    };

    let mut walk = Walk {
        lookup: &lookup,
        visiting: vec![root.to_string()],
        visited: HashSet::new(),
        order: Vec::new(),
    };
    for dependency in direct {
        walk.visit(root, &dependency)?;
    }
    Ok(walk.order)
}

struct Walk<'a, F> {
    lookup: &'a F,
    /// Current DFS path, root first
    visiting: Vec<String>,
    visited: HashSet<String>,
    order: Vec<String>,
}

impl<F> Walk<'_, F>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn visit(&mut self, parent: &str, name: &str) -> Result<()> {
        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            let mut chain = self.visiting[start..].to_vec();
            chain.push(name.to_string());
            return Err(PluginError::DependencyCycle { chain });
        }
        if self.visited.contains(name) {
            return Ok(());
        }

        let dependencies = (self.lookup)(name)
            .ok_or_else(|| PluginError::dependency_not_found(parent, name))?;

        self.visiting.push(name.to_string());
        for dependency in &dependencies {
            self.visit(name, dependency)?;
        }
        self.visiting.pop();

        self.visited.insert(name.to_string());
        self.order.push(name.to_string());
        Ok(())
    }
}
