//! Endpoint dependency resolution
//!
//! Endpoints may declare a single `depends_on` prerequisite whose results
//! feed their request builder (e.g. per-carrier endpoints depend on the
//! carrier list). Chains are linear; the resolver walks from the target to
//! the root and returns the chain in execution order, deepest prerequisite
//! first, target last.

use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::model::EndpointEntry;

/// Resolve the execution chain for `target_name` within `catalog`.
pub fn resolve_chain<'a>(
    catalog: &'a [EndpointEntry],
    target_name: &str,
) -> Result<Vec<&'a EndpointEntry>> {
    let target = find(catalog, target_name)
        .ok_or_else(|| CoreError::EndpointNotFound(target_name.to_string()))?;

    let mut chain = vec![target];
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(target.name.as_str());

    let mut current = target;
    loop {
        if current.definition.requires_iteration_list && current.definition.depends_on.is_none() {
            return Err(CoreError::MissingDependencyDeclaration(
                current.name.clone(),
            ));
        }
        let Some(depends_on) = current.definition.depends_on.as_deref() else {
            break;
        };
        if !visited.insert(depends_on) {
            return Err(CoreError::DependencyCycle(depends_on.to_string()));
        }
        let dependency = find(catalog, depends_on).ok_or_else(|| CoreError::DependencyNotFound {
            endpoint: current.name.clone(),
            depends_on: depends_on.to_string(),
        })?;
        chain.push(dependency);
        current = dependency;
    }

    chain.reverse();
    Ok(chain)
}

fn find<'a>(catalog: &'a [EndpointEntry], name: &str) -> Option<&'a EndpointEntry> {
    catalog.iter().find(|entry| entry.name == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::builders::RequestBuilder;
    use crate::model::EndpointDefinition;

    fn entry(name: &str, depends_on: Option<&str>) -> EndpointEntry {
        let mut definition = EndpointDefinition::new(name, name, 1, RequestBuilder::Simple);
        if let Some(dep) = depends_on {
            definition = definition.with_depends_on(dep);
        }
        EndpointEntry::new(name, definition)
    }

    #[test]
    fn test_standalone_endpoint_resolves_to_itself() {
        let catalog = vec![entry("carriers", None)];
        let chain = resolve_chain(&catalog, "carriers").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].name, "carriers");
    }

    #[test]
    fn test_chain_is_ordered_deepest_first() {
        let catalog = vec![
            entry("carriers", None),
            entry("vehicles", Some("carriers")),
            entry("ignition", Some("vehicles")),
        ];
        let chain = resolve_chain(&catalog, "ignition").unwrap();
        let names: Vec<&str> = chain.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["carriers", "vehicles", "ignition"]);
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let catalog = vec![entry("carriers", None)];
        assert!(matches!(
            resolve_chain(&catalog, "nope"),
            Err(CoreError::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_missing_dependency_is_an_error() {
        let catalog = vec![entry("vehicles", Some("carriers"))];
        let result = resolve_chain(&catalog, "vehicles");
        assert!(matches!(
            result,
            Err(CoreError::DependencyNotFound { .. })
        ));
    }

    #[test]
    fn test_cycle_is_detected() {
        let catalog = vec![entry("a", Some("b")), entry("b", Some("a"))];
        assert!(matches!(
            resolve_chain(&catalog, "a"),
            Err(CoreError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_iteration_list_without_dependency_is_an_error() {
        let mut definition =
            EndpointDefinition::new("drivers", "drivers", 4, RequestBuilder::Simple);
        definition.requires_iteration_list = true;
        let catalog = vec![EndpointEntry::new("drivers", definition)];
        assert!(matches!(
            resolve_chain(&catalog, "drivers"),
            Err(CoreError::MissingDependencyDeclaration(_))
        ));
    }
}
