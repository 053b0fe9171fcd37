//! reference resolution
//!
//! [Resolver] walks the body of every template looking for intrinsic calls and resolves each one in the scope of
//! the template it appears in:
//! - `get_resource` is a lookup among the template's resources
//! - `get_param` is a state machine, see [param]
//! - `get_attr` is a state machine, see [attr]
//!
//! Resolution produces a [Resolved] value when it succeeds. Values are only computed as far as needed to continue a
//! chain: a parameter value, an output value, a sub-value addressed by the remaining hierarchy. Anything the
//! validator cannot know (attributes of provider resources, pseudo parameters, ...) is [Resolved::Opaque] and
//! accepts any further addressing.
//!
//! A value that is itself a call is resolved in the scope it was written in. A property value flows into the child
//! template as the parameter's value but is resolved in the parent, an output value is resolved in the template
//! declaring the output.
//!
//! Failures are recorded as [crate::model::Diagnostic]s on the template performing the reference.
pub mod attr;
pub mod param;

use crate::model::{Diagnostic, DiagnosticKind, Forest, TemplateId};
use crate::value::{Element, Intrinsic, Value};
use crate::visit::VisitCalls;
use std::rc::Rc;

/// Upper bound of nested resolutions, reference loops between templates end here
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// resolved, but the value is unknown to the validator
    Opaque,
    /// a value and the template it was written in
    Value { scope: TemplateId, value: Value },
}

/// Resolution failed, the diagnostic is already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unresolved;

pub type Resolution = Result<Resolved, Unresolved>;

/// A hierarchy element ready to address into a value
#[derive(Debug, Clone, PartialEq)]
enum Key {
    Name(String),
    Index(i64),
    /// a nested call resolved to an unknown value
    Unknown,
}

pub struct Resolver<'f> {
    forest: &'f mut Forest,
    depth: usize,
}

impl<'f> Resolver<'f> {
    pub fn new(forest: &'f mut Forest) -> Self {
        Self { forest, depth: 0 }
    }

    /// Resolve all references of all templates reachable from the root
    pub fn resolve_forest(&mut self) {
        for template in self.forest.template_ids() {
            self.resolve_template(template);
        }
    }

    /// Resolve all references in the instances (resources, outputs, ...) of one template
    pub fn resolve_template(&mut self, template: TemplateId) {
        let body = Rc::clone(&self.forest.template(template).body);

        for (section, instances) in body.as_object().into_iter().flatten() {
            let Some(instances) = instances.as_object() else {
                continue;
            };

            tracing::trace!(%section, "resolving section");
            for (instance, value) in instances {
                value.visit_calls(&mut |call: &Intrinsic| {
                    // failures are recorded as diagnostics
                    let _ = self.resolve(template, call, instance);
                });
            }
        }
    }

    /// Resolve a single call in the scope of `template`
    ///
    /// `instance` is the name of the instance containing the call.
    pub fn resolve(&mut self, template: TemplateId, call: &Intrinsic, instance: &str) -> Resolution {
        if self.depth >= MAX_DEPTH {
            tracing::debug!(function = call.function_name(), instance, "resolution too deep");
            return Err(Unresolved);
        }

        self.depth += 1;
        let resolution = match call {
            Intrinsic::GetParam(hierarchy) => self.get_param(template, hierarchy, instance),
            Intrinsic::GetResource(element) => self.get_resource(template, element, instance),
            Intrinsic::GetAttr(hierarchy) => self.get_attr(template, hierarchy, instance),
        };
        self.depth -= 1;

        resolution
    }

    pub fn get_resource(
        &mut self,
        template: TemplateId,
        element: &Element,
        instance: &str,
    ) -> Resolution {
        let name = match self.key(template, element, instance) {
            Ok(Key::Name(name)) => name,
            Ok(Key::Unknown) => return Ok(Resolved::Opaque),
            _ => element.to_string(),
        };

        if let Some(index) = self.forest.find_resource(template, &name) {
            self.forest.template_mut(template).resources[index].used = true;
            return Ok(Resolved::Opaque);
        }

        self.report(
            template,
            Diagnostic::new(name, instance.to_string(), DiagnosticKind::GetResource, None),
        );
        Err(Unresolved)
    }

    fn report(&mut self, template: TemplateId, diagnostic: Diagnostic) {
        self.forest.template_mut(template).report(diagnostic);
    }

    /// Turn a hierarchy element into a [Key]. Nested calls are resolved in `scope`.
    fn key(&mut self, scope: TemplateId, element: &Element, instance: &str) -> Result<Key, Unresolved> {
        match element {
            Element::Key(key) => Ok(Key::Name(key.clone())),
            Element::Index(index) => Ok(Key::Index(*index)),
            Element::Call(call) => match self.resolve(scope, call, instance)? {
                Resolved::Opaque => Ok(Key::Unknown),
                Resolved::Value {
                    value: Value::String(key),
                    ..
                } => Ok(Key::Name(key)),
                Resolved::Value {
                    value: Value::Integer(index),
                    ..
                } => Ok(Key::Index(index)),
                Resolved::Value { .. } => Err(Unresolved),
            },
            Element::Invalid(_) => Err(Unresolved),
        }
    }

    /// Address one level into a resolved value
    ///
    /// `scope` is the template performing the reference, nested calls in `element` are resolved there.
    fn step(
        &mut self,
        scope: TemplateId,
        current: Resolved,
        element: &Element,
        instance: &str,
    ) -> Resolution {
        let key = self.key(scope, element, instance)?;

        let Resolved::Value {
            scope: value_scope,
            value,
        } = current
        else {
            return Ok(Resolved::Opaque);
        };

        let next = match (key, value) {
            (Key::Unknown, _) => return Ok(Resolved::Opaque),
            (Key::Name(name), Value::Object(mut object)) => {
                object.swap_remove(&name).ok_or(Unresolved)?
            }
            (Key::Index(index), Value::Array(array)) => nth(array, index)?,
            (Key::Name(name), Value::Array(array)) => {
                let index = name.parse().map_err(|_| Unresolved)?;
                nth(array, index)?
            }
            _ => return Err(Unresolved),
        };

        self.settle(
            Resolved::Value {
                scope: value_scope,
                value: next,
            },
            instance,
        )
    }

    /// A value that is itself a call is resolved in the scope it was written in
    fn settle(&mut self, resolved: Resolved, instance: &str) -> Resolution {
        match resolved {
            Resolved::Value {
                scope,
                value: Value::Call(call),
            } => self.resolve(scope, &call, instance),
            other => Ok(other),
        }
    }
}

fn nth(array: Vec<Value>, index: i64) -> Result<Value, Unresolved> {
    let index = usize::try_from(index).map_err(|_| Unresolved)?;
    array.into_iter().nth(index).ok_or(Unresolved)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::loader::Loader;
    use crate::memory_source;
    use crate::source::MemorySource;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    /// Load a forest from `root.yaml` (no mapping, no reconciliation)
    pub(crate) fn load(source: &MemorySource) -> Forest {
        Loader::new(source)
            .load_root(Path::new("root.yaml"))
            .expect("valid forest")
    }

    pub(crate) fn call(yaml: &str) -> Intrinsic {
        let value: Value = serde_yaml::from_str::<serde_yaml::Value>(yaml)
            .expect("valid yaml")
            .into();
        match value {
            Value::Call(call) => call,
            other => panic!("not a call: {other:?}"),
        }
    }

    #[test]
    fn get_resource_marks_used() {
        let source = memory_source! {
            "root.yaml" => "resources: {port: {type: OS::Neutron::Port}, server: {type: OS::Nova::Server}}"
        };
        let mut forest = load(&source);
        let root = forest.root();

        let resolution =
            Resolver::new(&mut forest).resolve(root, &call("get_resource: port"), "server");

        assert_eq!(resolution, Ok(Resolved::Opaque));
        let template = forest.template(root);
        assert!(template.resources[0].used);
        assert!(!template.resources[1].used);
        assert!(template.diagnostics.is_empty());
        assert!(template.valid);
    }

    #[test]
    fn get_resource_unknown_name_reports_once() {
        let source = memory_source! { "root.yaml" => "resources: {server: {type: OS::Nova::Server}}" };
        let mut forest = load(&source);
        let root = forest.root();

        let resolution =
            Resolver::new(&mut forest).resolve(root, &call("get_resource: missing"), "server");

        assert_eq!(resolution, Err(Unresolved));
        let template = forest.template(root);
        assert!(!template.valid);
        assert_eq!(
            template.diagnostics,
            vec![Diagnostic::new(
                "missing".into(),
                "server".into(),
                DiagnosticKind::GetResource,
                None
            )]
        );
    }

    #[test]
    fn resolve_template_visits_all_sections() {
        let source = memory_source! {
            "root.yaml" => r#"
resources:
  server:
    type: OS::Nova::Server
    properties:
      networks: [{port: {get_resource: nope}}]
outputs:
  out:
    value: {get_resource: server}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();

        Resolver::new(&mut forest).resolve_template(root);

        let template = forest.template(root);
        assert!(template.resources[0].used);
        assert_eq!(template.diagnostics.len(), 1);
        assert_eq!(template.diagnostics[0].referent, "nope");
    }

    #[test]
    fn reference_loop_across_templates_terminates() {
        let source = memory_source! {
            "root.yaml" => r#"
resources:
  a:
    type: c.yaml
    properties:
      p: {get_attr: [a, out]}
"#,
            "c.yaml" => r#"
parameters:
  p: {type: string}
outputs:
  out:
    value: {get_param: p}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();
        crate::reconcile::reconcile(&mut forest, root);
        let child = forest.template(root).resources[0].child.unwrap();

        Resolver::new(&mut forest).resolve_forest();

        assert_eq!(
            forest.template(root).diagnostics,
            vec![Diagnostic::new(
                "out".into(),
                "a - output of a".into(),
                DiagnosticKind::GetAttr,
                None
            )]
        );
        assert_eq!(
            forest.template(child).diagnostics,
            vec![Diagnostic::new(
                "p".into(),
                "out".into(),
                DiagnosticKind::GetParam,
                None
            )]
        );
    }

    #[test]
    fn step_addresses_objects_and_arrays() {
        let source = memory_source! { "root.yaml" => "{}" };
        let mut forest = load(&source);
        let root = forest.root();
        let mut resolver = Resolver::new(&mut forest);

        let value: Value = serde_yaml::from_str::<serde_yaml::Value>("{list: [a, b]}")
            .unwrap()
            .into();
        let current = Resolved::Value { scope: root, value };

        let list = resolver
            .step(root, current, &Element::Key("list".into()), "x")
            .unwrap();
        let second = resolver
            .step(root, list.clone(), &Element::Index(1), "x")
            .unwrap();
        assert_eq!(
            second,
            Resolved::Value {
                scope: root,
                value: "b".into()
            }
        );

        assert_eq!(
            resolver.step(root, list, &Element::Index(2), "x"),
            Err(Unresolved)
        );
        assert_eq!(
            resolver.step(root, Resolved::Opaque, &Element::Key("any".into()), "x"),
            Ok(Resolved::Opaque)
        );
    }
}
