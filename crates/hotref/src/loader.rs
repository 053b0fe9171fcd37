//! loading template and environment documents
//!
//! [Loader::load_root] parses the root template and, for every resource whose type names a template file, loads
//! that file as a child owned by the resource. Paths are resolved relative to the including document and
//! canonicalized by the [Source], so the same file always has the same identity.
//!
//! The chain of templates currently being opened is passed down the recursion. Opening a template that is already
//! part of the chain is a [LoadError::CyclicInclude].
use crate::model::{
    is_template_type, template_type_path, Environment, EnvironmentId, EnvironmentParameter, Forest,
    GroupKind, MappingRule, MappingTarget, ParentLink, PropertyParameter, Resource, Template,
    TemplateId,
};
use crate::source::Source;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("{} is not a template file (.yaml expected)", .0.display())]
    NotATemplate(PathBuf),
    #[error("File {} could not be opened", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse yaml file {}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Template {} includes itself: {}", .path.display(), display_chain(.chain))]
    CyclicInclude { path: PathBuf, chain: Vec<PathBuf> },
    #[error("Invalid parameter override {0:?} (key=value expected)")]
    InvalidOverride(String),
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(derive_new::new)]
pub struct Loader<'s> {
    source: &'s dyn Source,
}

impl<'s> Loader<'s> {
    /// Load the root template and everything it includes
    pub fn load_root(&self, path: &Path) -> Result<Forest, LoadError> {
        if !is_template_type(&path.to_string_lossy()) {
            return Err(LoadError::NotATemplate(path.to_path_buf()));
        }

        let path = self.canonicalize(path)?;
        let mut forest = Forest::new();
        let root = self.load_template(&mut forest, &path, None, &[])?;
        debug_assert_eq!(root, forest.root());

        Ok(forest)
    }

    /// Load a template (and its subtree) owned by `parent`
    ///
    /// `ancestors` are the canonical paths of all templates above this one.
    pub(crate) fn load_template(
        &self,
        forest: &mut Forest,
        path: &Path,
        parent: Option<ParentLink>,
        ancestors: &[PathBuf],
    ) -> Result<TemplateId, LoadError> {
        if ancestors.iter().any(|ancestor| ancestor == path) {
            return Err(LoadError::CyclicInclude {
                path: path.to_path_buf(),
                chain: ancestors.to_vec(),
            });
        }

        tracing::info!(path=%path.display(), "loading template");
        let body = self.parse(path)?;

        let mut template = Template::new(path.to_path_buf(), parent);

        for (name, declaration) in sections(&body, "parameters") {
            let param = PropertyParameter::parameter(name.as_str(), declaration);
            template.parameters.push(forest.add_param(param));
        }

        for (name, definition) in sections(&body, "resources") {
            template
                .resources
                .push(parse_resource(forest, name, definition));
        }

        template.outputs = Rc::new(
            body.get("outputs")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        );
        template.body = Rc::new(body);

        let id = forest.add_template(template);

        let mut chain = ancestors.to_vec();
        chain.push(path.to_path_buf());
        let base = path.parent().unwrap_or(Path::new(""));

        for index in 0..forest.template(id).resources.len() {
            let type_name = &forest.template(id).resources[index].type_name;
            if !is_template_type(type_name) {
                continue;
            }

            let child_path = self.canonicalize(&base.join(template_type_path(type_name)))?;
            let link = ParentLink {
                template: id,
                resource: index,
            };
            let child = self.load_template(forest, &child_path, Some(link), &chain)?;
            forest.template_mut(id).resources[index].child = Some(child);
        }

        Ok(id)
    }

    /// Load an environment and record its registry and parameters
    pub fn load_environment(
        &self,
        forest: &mut Forest,
        path: &Path,
    ) -> Result<EnvironmentId, LoadError> {
        let path = self.canonicalize(path)?;
        tracing::info!(path=%path.display(), "loading environment");
        let body = self.parse(&path)?;

        let mut environment = Environment::new(path);

        for (origin, target) in sections(&body, "resource_registry") {
            match target {
                Value::String(target) => environment.resource_registry.push(MappingRule::new(
                    origin.clone(),
                    MappingTarget::Type(target.clone()),
                )),
                Value::Object(scoped) if origin == "resources" => {
                    for (resource, entries) in scoped {
                        for (origin, target) in entries.as_object().into_iter().flatten() {
                            // hooks and other per-resource settings are not mappings
                            let Some(target) = target.as_str().filter(|t| is_template_type(t)) else {
                                continue;
                            };

                            environment.resource_registry.push(MappingRule::new(
                                origin.clone(),
                                MappingTarget::Scoped {
                                    target: target.to_string(),
                                    resource: resource.clone(),
                                },
                            ));
                        }
                    }
                }
                _ => tracing::debug!(%origin, "ignoring registry entry"),
            }
        }

        environment.parameters = environment_parameters(&body, "parameters");
        environment.parameter_defaults = environment_parameters(&body, "parameter_defaults");
        environment.body = Rc::new(body);

        Ok(forest.add_environment(environment))
    }

    pub(crate) fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError> {
        self.source
            .canonicalize(path)
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read and parse a document. Documents without a top-level mapping are treated as empty.
    fn parse(&self, path: &Path) -> Result<Value, LoadError> {
        let contents = self.source.read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&contents).map_err(|source| LoadError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;

        let body = Value::from(yaml);
        if body.as_object().is_none() {
            tracing::debug!(path=%path.display(), "document has no top-level mapping");
        }

        Ok(body)
    }
}

/// Entries of a top-level mapping section, empty when missing or not a mapping
fn sections<'v>(body: &'v Value, section: &str) -> impl Iterator<Item = (&'v String, &'v Value)> {
    body.get(section)
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
}

fn environment_parameters(body: &Value, section: &str) -> IndexMap<String, EnvironmentParameter> {
    sections(body, section)
        .map(|(name, value)| {
            (
                name.clone(),
                EnvironmentParameter {
                    value: value.clone(),
                    used: false,
                },
            )
        })
        .collect()
}

/// Group resources carry their real type and properties in the member definition
fn parse_resource(forest: &mut Forest, name: &str, definition: &Value) -> Resource {
    let declared_type = definition
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let group = GroupKind::from_type(declared_type);
    let properties = definition.get("properties");

    let (type_name, properties) = match group {
        Some(kind) => {
            let member = properties.and_then(|properties| properties.get(kind.member_key()));
            match member.and_then(|member| member.get("type")).and_then(Value::as_str) {
                Some(member_type) => (member_type, member.and_then(|m| m.get("properties"))),
                None => (declared_type, None),
            }
        }
        None => (declared_type, properties),
    };

    let properties = properties
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .map(|(name, value)| {
            forest.add_param(PropertyParameter::property(name.as_str(), value.clone()))
        })
        .collect();

    Resource {
        name: name.to_string(),
        type_name: type_name.to_string(),
        body: Rc::new(definition.clone()),
        child: None,
        group,
        properties,
        used: false,
    }
}
