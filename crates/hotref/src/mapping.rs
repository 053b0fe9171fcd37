//! environment driven type substitution
//!
//! Every resource of the forest is checked against the resource registries of all environments. A matching rule
//! rewrites the resource type. The rewritten type is checked again until no rule applies, so chains like
//! `OS::Custom::A -> OS::Custom::B -> b.yaml` end up at `b.yaml`.
//!
//! Rule precedence for a single rewrite step:
//! 1. direct rules scoped to the resource name
//! 2. other direct rules
//! 3. wildcard rules
//!
//! Within each group environments and rules are tried in declaration order.
//!
//! When the final type names a template, the template is loaded relative to the environment that mapped it and
//! attached as the resource's child. Each environment keeps the templates it attached; when the same template is
//! mapped onto another resource, the attached one is cloned instead of loaded again.
use crate::loader::{LoadError, Loader};
use crate::model::{
    is_template_type, template_type_path, EnvironmentId, Forest, MappingRule, MappingTarget,
    ParentLink, TemplateId,
};
use std::path::Path;

/// Upper bound of rewrites for a single resource
const MAX_REWRITES: usize = 32;

/// Apply all environments to the forest
pub fn apply(forest: &mut Forest, loader: &Loader) -> Result<(), LoadError> {
    let any_rules = forest
        .environment_ids()
        .any(|id| !forest.environment(id).resource_registry.is_empty());
    if !any_rules {
        return Ok(());
    }

    let root = forest.root();
    TypeMapper::new(forest, loader).map_template(root)
}

#[derive(derive_new::new)]
struct TypeMapper<'f, 'l, 's> {
    forest: &'f mut Forest,
    loader: &'l Loader<'s>,
}

impl<'f, 'l, 's> TypeMapper<'f, 'l, 's> {
    fn map_template(&mut self, template: TemplateId) -> Result<(), LoadError> {
        for index in 0..self.forest.template(template).resources.len() {
            self.map_resource(template, index)?;

            if let Some(child) = self.forest.template(template).resources[index].child {
                self.map_template(child)?;
            }
        }

        Ok(())
    }

    fn map_resource(&mut self, template: TemplateId, index: usize) -> Result<(), LoadError> {
        let resource = &self.forest.template(template).resources[index];
        let Some((type_name, environment)) = self.final_type(&resource.type_name, &resource.name)
        else {
            return Ok(());
        };

        tracing::debug!(
            resource = %resource.name,
            from = %resource.type_name,
            to = %type_name,
            "mapping resource type"
        );

        let child = if is_template_type(&type_name) {
            Some(self.attach(template, index, &type_name, environment)?)
        } else {
            None
        };

        let resource = &mut self.forest.template_mut(template).resources[index];
        resource.type_name = type_name;
        resource.child = child;

        Ok(())
    }

    /// Follow rules until none applies. `None` when the type is not mapped at all.
    fn final_type(&self, type_name: &str, resource_name: &str) -> Option<(String, EnvironmentId)> {
        let mut seen = vec![type_name.to_string()];
        let mut current: Option<(String, EnvironmentId)> = None;

        loop {
            let from = current.as_ref().map_or(type_name, |(t, _)| t.as_str());
            let Some((next, environment)) = self.find_rule(from, resource_name) else {
                break;
            };

            if next == from {
                break;
            }

            if seen.contains(&next) || seen.len() > MAX_REWRITES {
                tracing::warn!(
                    resource = resource_name,
                    chain = ?seen,
                    "resource registry rules do not converge"
                );
                break;
            }

            tracing::trace!(from, to = %next, "rewrite step");
            seen.push(next.clone());
            current = Some((next, environment));
        }

        current
    }

    fn find_rule(&self, type_name: &str, resource_name: &str) -> Option<(String, EnvironmentId)> {
        fn precedence(rule: &MappingRule) -> u8 {
            match (&rule.target, rule.is_wildcard()) {
                (_, true) => 2,
                (MappingTarget::Scoped { .. }, false) => 0,
                (MappingTarget::Type(_), false) => 1,
            }
        }

        (0..=2).find_map(|level| {
            self.forest.environment_ids().find_map(|environment| {
                self.forest
                    .environment(environment)
                    .resource_registry
                    .iter()
                    .filter(|rule| precedence(rule) == level)
                    .find_map(|rule| rule.apply(type_name, resource_name))
                    .map(|target| (target, environment))
            })
        })
    }

    /// Child template for a resource mapped to `type_name`
    fn attach(
        &mut self,
        template: TemplateId,
        index: usize,
        type_name: &str,
        environment: EnvironmentId,
    ) -> Result<TemplateId, LoadError> {
        let base = self
            .forest
            .environment(environment)
            .path
            .parent()
            .unwrap_or(Path::new(""))
            .to_path_buf();
        let path = self
            .loader
            .canonicalize(&base.join(template_type_path(type_name)))?;

        let mut ancestors = self.forest.ancestry(template);
        ancestors.reverse();
        if ancestors.contains(&path) {
            return Err(LoadError::CyclicInclude {
                path,
                chain: ancestors,
            });
        }

        let link = ParentLink {
            template,
            resource: index,
        };

        let attached = self
            .forest
            .environment(environment)
            .templates
            .get(&path)
            .copied();

        let child = match attached {
            Some(attached) => self.forest.clone_template(attached, Some(link)),
            None => {
                let child = self
                    .loader
                    .load_template(self.forest, &path, Some(link), &ancestors)?;
                self.forest
                    .environment_mut(environment)
                    .templates
                    .insert(path, child);
                child
            }
        };

        self.forest.template_mut(child).environment = Some(environment);
        Ok(child)
    }
}
