//! pass orchestration
//!
//! Each pass relies on the previous one being complete for the whole forest:
//! 1. load the root template and everything it includes
//! 2. load the environments
//! 3. map resource types, attaching mapped templates
//! 4. apply parameter overrides and environment parameters
//! 5. reconcile properties with parameters
//! 6. resolve references
//! 7. check dependencies
use crate::depends;
use crate::loader::{LoadError, Loader};
use crate::mapping;
use crate::model::Forest;
use crate::reconcile::{apply_environment_parameters, apply_overrides, reconcile};
use crate::resolve::Resolver;
use crate::source::Source;
use indexmap::IndexMap;
use std::path::PathBuf;

/// What to validate
#[derive(Debug, Clone, Default, PartialEq, derive_new::new)]
pub struct Options {
    /// root template
    pub template: PathBuf,
    /// environments, in the order they are applied
    pub environments: Vec<PathBuf>,
    /// `name -> value` assigned to root parameters
    pub parameters: IndexMap<String, String>,
}

/// Parse `key=value` overrides. A single entry may hold several overrides separated by `;`.
pub fn parse_overrides(entries: &[String]) -> Result<IndexMap<String, String>, LoadError> {
    let entries: Vec<&str> = match entries {
        [single] => single.split(';').filter(|entry| !entry.is_empty()).collect(),
        entries => entries.iter().map(String::as_str).collect(),
    };

    entries
        .into_iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| LoadError::InvalidOverride(entry.to_string()))
        })
        .collect()
}

#[derive(derive_new::new)]
pub struct Validator<'s> {
    source: &'s dyn Source,
}

impl<'s> Validator<'s> {
    /// Run all passes. Only unreadable or unparseable documents fail, everything else ends up as diagnostics.
    pub fn validate(&self, options: &Options) -> Result<Forest, LoadError> {
        let loader = Loader::new(self.source);

        let mut forest = loader.load_root(&options.template)?;
        for environment in &options.environments {
            loader.load_environment(&mut forest, environment)?;
        }

        mapping::apply(&mut forest, &loader)?;

        apply_overrides(&mut forest, &options.parameters);
        apply_environment_parameters(&mut forest);

        let root = forest.root();
        reconcile(&mut forest, root);

        Resolver::new(&mut forest).resolve_forest();
        depends::check(&mut forest);

        let templates = forest.template_ids();
        tracing::info!(
            templates = templates.len(),
            invalid = templates
                .iter()
                .filter(|id| !forest.template(**id).valid)
                .count(),
            "validation finished"
        );

        Ok(forest)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory_source;
    use crate::model::{Diagnostic, DiagnosticKind};
    use pretty_assertions::assert_eq;

    fn strings(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overrides_from_separate_entries() {
        let overrides = parse_overrides(&strings(&["image=fedora", "flavor = m1.small"])).unwrap();
        assert_eq!(
            overrides.into_iter().collect::<Vec<_>>(),
            vec![
                ("image".to_string(), "fedora".to_string()),
                ("flavor".to_string(), "m1.small".to_string())
            ]
        );
    }

    #[test]
    fn overrides_from_single_joined_entry() {
        let overrides = parse_overrides(&strings(&["image=fedora;key=a=b;"])).unwrap();
        assert_eq!(overrides["image"], "fedora");
        assert_eq!(overrides["key"], "a=b");
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn override_without_value_is_rejected() {
        let error = parse_overrides(&strings(&["image"])).expect_err("invalid");
        assert!(matches!(error, LoadError::InvalidOverride(entry) if entry == "image"));
        assert!(parse_overrides(&strings(&["=value"])).is_err());
    }

    #[test]
    fn missing_parameter_in_property() {
        let source = memory_source! {
            "root.yaml" => r#"
resources:
  server:
    type: OS::Nova::Server
    properties:
      flavor: {get_param: missing}
"#
        };

        let forest = Validator::new(&source)
            .validate(&Options::new("root.yaml".into(), vec![], IndexMap::new()))
            .unwrap();

        let root = forest.template(forest.root());
        assert!(!root.valid);
        assert_eq!(
            root.diagnostics,
            vec![Diagnostic::new(
                "missing".into(),
                "server".into(),
                DiagnosticKind::GetParam,
                None
            )]
        );
    }

    #[test]
    fn full_pipeline() {
        let source = memory_source! {
            "templates/root.yaml" => r#"
parameters:
  image: {type: string}
resources:
  net:
    type: OS::Custom::NetPublic
  server:
    type: OS::Nova::Server
    depends_on: net
    properties:
      image: {get_param: image}
      network: {get_attr: [net, id]}
"#,
            "environments/env.yaml" => r#"
resource_registry:
  OS::Custom::Net*: file:../templates/net_*.yaml
parameter_defaults:
  cidr: 10.0.0.0/24
"#,
            "templates/net_Public.yaml" => r#"
parameters:
  cidr: {type: string}
resources:
  subnet:
    type: OS::Neutron::Subnet
    properties:
      cidr: {get_param: cidr}
outputs:
  id:
    value: {get_resource: subnet}
"#
        };

        let options = Options::new(
            "templates/root.yaml".into(),
            vec!["environments/env.yaml".into()],
            [("image".to_string(), "cirros".to_string())]
                .into_iter()
                .collect(),
        );
        let forest = Validator::new(&source).validate(&options).unwrap();

        for id in forest.template_ids() {
            let template = forest.template(id);
            assert_eq!(template.diagnostics, vec![], "{}", template.path.display());
        }

        let root = forest.template(forest.root());
        assert!(root.resources[0].used);
        assert!(!root.resources[1].used, "nothing refers to the server");
        let net = forest.template(root.resources[0].child.unwrap());
        assert_eq!(net.path, PathBuf::from("templates/net_Public.yaml"));
        assert!(net.resources[0].used);

        let environment = forest.environment(forest.environment_ids().next().unwrap());
        assert!(environment.valid);
        assert!(environment.parameter_defaults["cidr"].used);
    }
}
