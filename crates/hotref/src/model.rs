//! document model of a template forest
//!
//! All nodes live in a [Forest] arena and refer to each other by id. A [Template] knows its parent through a
//! [ParentLink] (template + index of the owning resource), a [Resource] knows its child template by id.
//!
//! Parameters and properties share one record type, [PropertyParameter], stored in the arena as well. After
//! reconciliation a child template's parameter and the owning resource's property of the same name are the same
//! [ParamId], so usage tracking and value lookup see one merged definition.
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const AUTO_SCALING_GROUP: &str = "OS::Heat::AutoScalingGroup";
pub const RESOURCE_GROUP: &str = "OS::Heat::ResourceGroup";

/// Pseudo parameters are provided by the orchestrator and always resolve
pub const PSEUDO_PARAMETERS: [&str; 3] = ["OS::stack_name", "OS::stack_id", "OS::project_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(usize);

/// Does this resource type name a nested template?
pub fn is_template_type(type_name: &str) -> bool {
    type_name.ends_with(".yaml") || type_name.ends_with(".yml")
}

/// Path of a template type, relative to the document that names it
pub fn template_type_path(type_name: &str) -> &Path {
    let path = type_name
        .strip_prefix("file://")
        .or_else(|| type_name.strip_prefix("file:"))
        .unwrap_or(type_name);
    Path::new(path)
}

/// Template arena
#[derive(Debug)]
pub struct Forest {
    templates: Vec<Template>,
    environments: Vec<Environment>,
    parameters: Vec<PropertyParameter>,
}

impl Forest {
    /// The first template added is the root
    pub(crate) fn new() -> Self {
        Self {
            templates: vec![],
            environments: vec![],
            parameters: vec![],
        }
    }

    pub fn root(&self) -> TemplateId {
        TemplateId(0)
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.0]
    }

    pub fn template_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.templates[id.0]
    }

    pub fn environment(&self, id: EnvironmentId) -> &Environment {
        &self.environments[id.0]
    }

    pub fn environment_mut(&mut self, id: EnvironmentId) -> &mut Environment {
        &mut self.environments[id.0]
    }

    pub fn param(&self, id: ParamId) -> &PropertyParameter {
        &self.parameters[id.0]
    }

    pub fn param_mut(&mut self, id: ParamId) -> &mut PropertyParameter {
        &mut self.parameters[id.0]
    }

    pub(crate) fn add_template(&mut self, template: Template) -> TemplateId {
        self.templates.push(template);
        TemplateId(self.templates.len() - 1)
    }

    pub(crate) fn add_environment(&mut self, environment: Environment) -> EnvironmentId {
        self.environments.push(environment);
        EnvironmentId(self.environments.len() - 1)
    }

    pub(crate) fn add_param(&mut self, param: PropertyParameter) -> ParamId {
        self.parameters.push(param);
        ParamId(self.parameters.len() - 1)
    }

    pub fn environment_ids(&self) -> impl Iterator<Item = EnvironmentId> {
        (0..self.environments.len()).map(EnvironmentId)
    }

    /// Templates reachable from the root, depth-first, parents before children
    pub fn template_ids(&self) -> Vec<TemplateId> {
        let mut ids = vec![];
        let mut stack = vec![self.root()];

        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(
                self.template(id)
                    .resources
                    .iter()
                    .rev()
                    .filter_map(|resource| resource.child),
            );
        }

        ids
    }

    /// Parameter declared in a template, by name
    pub fn find_param(&self, template: TemplateId, name: &str) -> Option<ParamId> {
        self.template(template)
            .parameters
            .iter()
            .copied()
            .find(|id| self.param(*id).name == name)
    }

    /// Index of a resource in a template, by name
    pub fn find_resource(&self, template: TemplateId, name: &str) -> Option<usize> {
        self.template(template)
            .resources
            .iter()
            .position(|resource| resource.name == name)
    }

    /// Paths from the given template up to the root
    pub fn ancestry(&self, template: TemplateId) -> Vec<PathBuf> {
        let mut paths = vec![];
        let mut current = Some(template);

        while let Some(id) = current {
            let template = self.template(id);
            paths.push(template.path.clone());
            current = template.parent.map(|link| link.template);
        }

        paths
    }

    /// Deep copy of a template subtree
    ///
    /// Bodies and outputs are shared. Parameters, resources and diagnostics are fresh for the clone, so usage and
    /// validity are tracked independently.
    pub(crate) fn clone_template(&mut self, id: TemplateId, parent: Option<ParentLink>) -> TemplateId {
        let source = self.template(id);
        let mut clone = Template::new(source.path.clone(), parent);
        clone.environment = source.environment;
        clone.body = Rc::clone(&source.body);
        clone.outputs = Rc::clone(&source.outputs);

        let parameters = source.parameters.clone();
        let resources = source.resources.clone();

        clone.parameters = parameters
            .into_iter()
            .map(|param| {
                let copy = self.param(param).fresh_copy();
                self.add_param(copy)
            })
            .collect();

        let clone_id = self.add_template(clone);

        for (index, resource) in resources.into_iter().enumerate() {
            let properties = resource
                .properties
                .iter()
                .map(|property| {
                    let copy = self.param(*property).fresh_copy();
                    self.add_param(copy)
                })
                .collect();

            let child = resource.child.map(|child| {
                self.clone_template(
                    child,
                    Some(ParentLink {
                        template: clone_id,
                        resource: index,
                    }),
                )
            });

            self.template_mut(clone_id).resources.push(Resource {
                properties,
                child,
                used: false,
                ..resource
            });
        }

        tracing::debug!(path=%self.template(clone_id).path.display(), "cloned template");
        clone_id
    }
}

/// The resource of a parent template that owns a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub template: TemplateId,
    /// index into the parent's resources
    pub resource: usize,
}

/// One loaded template document
#[derive(Debug)]
pub struct Template {
    pub path: PathBuf,
    /// `None` for the root
    pub parent: Option<ParentLink>,
    /// Environment whose resource registry attached this template, if any
    pub environment: Option<EnvironmentId>,
    pub resources: Vec<Resource>,
    pub parameters: Vec<ParamId>,
    /// output name -> output definition (`{value: ...}`)
    pub outputs: Rc<IndexMap<String, Value>>,
    pub body: Rc<Value>,
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Template {
    pub(crate) fn new(path: PathBuf, parent: Option<ParentLink>) -> Self {
        Self {
            path,
            parent,
            environment: None,
            resources: vec![],
            parameters: vec![],
            outputs: Default::default(),
            body: Rc::new(Value::Null),
            valid: true,
            diagnostics: vec![],
        }
    }

    /// Record a diagnostic, the template is invalid from now on
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.valid = false;
        if !self.diagnostics.contains(&diagnostic) {
            tracing::debug!(path=%self.path.display(), %diagnostic, "invalid reference");
            self.diagnostics.push(diagnostic);
        }
    }
}

/// Group resources wrap their real type one level deeper
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GroupKind {
    AutoScalingGroup,
    ResourceGroup,
}

impl GroupKind {
    pub fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            AUTO_SCALING_GROUP => Some(GroupKind::AutoScalingGroup),
            RESOURCE_GROUP => Some(GroupKind::ResourceGroup),
            _ => None,
        }
    }

    /// Key below `properties` holding the member definition
    pub fn member_key(&self) -> &'static str {
        match self {
            GroupKind::AutoScalingGroup => "resource",
            GroupKind::ResourceGroup => "resource_def",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    /// provider type, or template path once it names (or is mapped to) a template
    pub type_name: String,
    pub body: Rc<Value>,
    pub child: Option<TemplateId>,
    pub group: Option<GroupKind>,
    pub properties: Vec<ParamId>,
    pub used: bool,
}

/// A parameter of a template, a property of a resource, or both after merging
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct PropertyParameter {
    pub name: String,
    #[new(default)]
    pub used: bool,
    /// declared type (parameters only)
    #[new(default)]
    pub type_name: Option<String>,
    #[new(default)]
    pub default: Option<Value>,
    #[new(default)]
    pub hidden: bool,
    /// property value, or injected by an environment / override
    #[new(default)]
    pub value: Option<Value>,
}

impl PropertyParameter {
    /// Parameter from its declaration (`{type: ..., default: ..., hidden: ...}`)
    pub fn parameter(name: impl Into<String>, declaration: &Value) -> Self {
        let mut param = Self::new(name.into());
        param.type_name = declaration
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);
        param.default = declaration.get("default").filter(|v| !v.is_null()).cloned();
        param.hidden = matches!(declaration.get("hidden"), Some(Value::Boolean(true)));
        param
    }

    pub fn property(name: impl Into<String>, value: Value) -> Self {
        let mut property = Self::new(name.into());
        property.value = Some(value).filter(|v| !v.is_null());
        property
    }

    /// Merge another record into this one, values defined on the other side win
    pub fn merge(&mut self, other: &PropertyParameter) {
        if self.name != other.name {
            return;
        }

        self.used |= other.used;
        self.hidden |= other.hidden;

        if other.value.is_some() {
            self.value = other.value.clone();
        }

        if other.default.is_some() {
            self.default = other.default.clone();
        }

        if other.type_name.is_some() {
            self.type_name = other.type_name.clone();
        }
    }

    fn fresh_copy(&self) -> Self {
        Self {
            used: false,
            ..self.clone()
        }
    }
}

/// Target of a resource registry rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Type(String),
    /// applies only to the resource with the given name
    Scoped { target: String, resource: String },
}

impl MappingTarget {
    pub fn target(&self) -> &str {
        match self {
            MappingTarget::Type(target) => target,
            MappingTarget::Scoped { target, .. } => target,
        }
    }
}

/// One `resource_registry` entry
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct MappingRule {
    pub origin: String,
    pub target: MappingTarget,
}

impl MappingRule {
    pub fn is_wildcard(&self) -> bool {
        self.origin.contains('*')
    }

    /// The type a resource gets when this rule applies to it
    pub fn apply(&self, type_name: &str, resource_name: &str) -> Option<String> {
        if let MappingTarget::Scoped { resource, .. } = &self.target {
            if resource != resource_name {
                return None;
            }
        }

        let target = self.target.target();

        if !self.is_wildcard() {
            return (self.origin == type_name).then(|| target.to_string());
        }

        let segment = if let Some(prefix) = self.origin.strip_suffix('*') {
            type_name.strip_prefix(prefix)?
        } else if let Some(suffix) = self.origin.strip_prefix('*') {
            type_name.strip_suffix(suffix)?
        } else {
            // wildcard in the middle is not supported
            return None;
        };

        Some(target.replacen('*', segment, 1))
    }
}

/// A value declared under `parameters` or `parameter_defaults` of an environment
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentParameter {
    pub value: Value,
    /// matched by a parameter of the forest
    pub used: bool,
}

/// One loaded environment document
#[derive(Debug)]
pub struct Environment {
    pub path: PathBuf,
    /// in declaration order
    pub resource_registry: Vec<MappingRule>,
    pub parameters: IndexMap<String, EnvironmentParameter>,
    pub parameter_defaults: IndexMap<String, EnvironmentParameter>,
    /// templates this environment attached, by canonical path
    pub templates: IndexMap<PathBuf, TemplateId>,
    pub body: Rc<Value>,
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Environment {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            resource_registry: vec![],
            parameters: Default::default(),
            parameter_defaults: Default::default(),
            templates: Default::default(),
            body: Rc::new(Value::Null),
            valid: true,
            diagnostics: vec![],
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.valid = false;
        if !self.diagnostics.contains(&diagnostic) {
            tracing::debug!(path=%self.path.display(), %diagnostic, "invalid environment entry");
            self.diagnostics.push(diagnostic);
        }
    }
}

/// A broken or unmatched reference
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, derive_new::new)]
pub struct Diagnostic {
    /// name that failed to resolve
    pub referent: String,
    /// instance performing the reference
    pub element: String,
    pub kind: DiagnosticKind,
    /// other side of a property/parameter mismatch
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    GetResource,
    GetParam,
    GetAttr,
    #[serde(rename = "MISS_PROP")]
    MissingProperty,
    #[serde(rename = "MISS_PARAM")]
    MissingParameter,
    DependsOn,
    EnvParam,
    EnvParamDefault,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::GetResource => f.write_str("GET_RESOURCE"),
            DiagnosticKind::GetParam => f.write_str("GET_PARAM"),
            DiagnosticKind::GetAttr => f.write_str("GET_ATTR"),
            DiagnosticKind::MissingProperty => f.write_str("MISS_PROP"),
            DiagnosticKind::MissingParameter => f.write_str("MISS_PARAM"),
            DiagnosticKind::DependsOn => f.write_str("DEPENDS_ON"),
            DiagnosticKind::EnvParam => f.write_str("ENV_PARAM"),
            DiagnosticKind::EnvParamDefault => f.write_str("ENV_PARAM_DEFAULT"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Diagnostic {
            referent, element, ..
        } = self;
        let file = self
            .file
            .as_deref()
            .map(|file| file.display().to_string())
            .unwrap_or_default();

        match self.kind {
            DiagnosticKind::GetResource => {
                write!(f, "Resource {referent} referred in {element} is not declared.")
            }
            DiagnosticKind::GetParam => {
                write!(f, "Parameter {referent} referred in {element} cannot be resolved.")
            }
            DiagnosticKind::GetAttr => write!(
                f,
                "Instance {referent} referred by get_attr in {element} cannot be resolved."
            ),
            DiagnosticKind::MissingProperty => write!(
                f,
                "Parameter {referent} has no corresponding default or property in {element} in {file}."
            ),
            DiagnosticKind::MissingParameter => write!(
                f,
                "Property {referent} of {element} has no corresponding parameter in {file}."
            ),
            DiagnosticKind::DependsOn => write!(
                f,
                "Resource {referent} that resource {element} depends on is not declared."
            ),
            DiagnosticKind::EnvParam => {
                write!(f, "Parameter {referent} has no match in root template.")
            }
            DiagnosticKind::EnvParamDefault => {
                write!(f, "Parameter default {referent} has no match in the stack.")
            }
        }
    }
}
