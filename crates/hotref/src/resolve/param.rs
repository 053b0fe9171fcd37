//! `get_param` resolution
//!
//! ```text
//! ParamName -> ParamValue -> ParamResolution* -> Resolved
//!     |            |               |
//!     +------------+---------------+----------> Error
//! ```
//!
//! - `ParamName` resolves the first element to a declared parameter. Pseudo parameters resolve right away.
//! - `ParamValue` picks the value: a property value that is a call is resolved in the parent template, otherwise
//!   the value, otherwise the default. A parameter without either is fine as long as nothing addresses into it,
//!   hidden parameters are accepted even then.
//! - `ParamResolution` addresses into the value with each remaining element.
use super::{Key, Resolution, Resolved, Resolver, Unresolved};
use crate::model::{Diagnostic, DiagnosticKind, ParamId, TemplateId, PSEUDO_PARAMETERS};
use crate::value::{Element, Value};

#[derive(Debug)]
enum State {
    ParamName,
    ParamValue(ParamId),
    ParamResolution {
        param: Option<ParamId>,
        current: Resolved,
        next: usize,
    },
    Resolved {
        param: Option<ParamId>,
        value: Resolved,
    },
    Error(String),
}

impl<'f> Resolver<'f> {
    pub(super) fn get_param(
        &mut self,
        template: TemplateId,
        hierarchy: &[Element],
        instance: &str,
    ) -> Resolution {
        let mut state = State::ParamName;

        loop {
            tracing::trace!(?state, instance, "get_param");

            state = match state {
                State::ParamName => self.param_name(template, hierarchy, instance),
                State::ParamValue(param) => self.param_value(template, param, hierarchy),
                State::ParamResolution {
                    param,
                    current,
                    next,
                } => match hierarchy.get(next) {
                    None => State::Resolved {
                        param,
                        value: current,
                    },
                    Some(element) => match self.step(template, current, element, instance) {
                        Ok(current) => State::ParamResolution {
                            param,
                            current,
                            next: next + 1,
                        },
                        Err(Unresolved) => State::Error(element.to_string()),
                    },
                },
                State::Resolved { param, value } => {
                    if let Some(param) = param {
                        self.forest.param_mut(param).used = true;
                    }
                    return Ok(value);
                }
                State::Error(referent) => {
                    self.report(
                        template,
                        Diagnostic::new(
                            referent,
                            instance.to_string(),
                            DiagnosticKind::GetParam,
                            None,
                        ),
                    );
                    return Err(Unresolved);
                }
            };
        }
    }

    fn param_name(&mut self, template: TemplateId, hierarchy: &[Element], instance: &str) -> State {
        let Some(first) = hierarchy.first() else {
            return State::Error("[]".to_string());
        };

        let name = match self.key(template, first, instance) {
            Ok(Key::Name(name)) => name,
            Ok(Key::Unknown) => {
                return State::ParamResolution {
                    param: None,
                    current: Resolved::Opaque,
                    next: 1,
                }
            }
            _ => return State::Error(first.to_string()),
        };

        if PSEUDO_PARAMETERS.contains(&name.as_str()) {
            return State::ParamResolution {
                param: None,
                current: Resolved::Opaque,
                next: 1,
            };
        }

        match self.forest.find_param(template, &name) {
            Some(param) => State::ParamValue(param),
            None => State::Error(name),
        }
    }

    fn param_value(&mut self, template: TemplateId, param: ParamId, hierarchy: &[Element]) -> State {
        let record = self.forest.param(param);
        let name = record.name.clone();
        let hidden = record.hidden;
        let value = record.value.clone();
        let default = record.default.clone();
        let list = record.type_name.as_deref() == Some("comma_delimited_list");
        let parent = self.forest.template(template).parent;
        let addressed = hierarchy.len() > 1;

        let current = match (value, default) {
            (Some(Value::Call(call)), _) => match parent {
                Some(link) => {
                    // resolved as part of the owning resource in the parent
                    let owner = self.forest.template(link.template).resources[link.resource]
                        .name
                        .clone();
                    match self.resolve(link.template, &call, &owner) {
                        Ok(resolved) => resolved,
                        Err(Unresolved) => return State::Error(name),
                    }
                }
                None => Resolved::Opaque,
            },
            (Some(value), _) => Resolved::Value {
                scope: parent.map_or(template, |link| link.template),
                value: split_list(value, list),
            },
            (None, Some(default)) => Resolved::Value {
                scope: template,
                value: split_list(default, list),
            },
            (None, None) if hidden || !addressed => Resolved::Opaque,
            (None, None) => return State::Error(name),
        };

        State::ParamResolution {
            param: Some(param),
            current,
            next: 1,
        }
    }
}

/// `comma_delimited_list` values given as a single string, `-P nets=a,b` or `default: "a,b"`
fn split_list(value: Value, list: bool) -> Value {
    match value {
        Value::String(s) if list => {
            Value::Array(s.split(',').map(|item| item.trim().into()).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory_source;
    use crate::model::Forest;
    use crate::reconcile::reconcile;
    use crate::resolve::test::{call, load};
    use pretty_assertions::assert_eq;

    fn resolve(forest: &mut Forest, template: TemplateId, yaml: &str) -> Resolution {
        Resolver::new(forest).resolve(template, &call(yaml), "instance")
    }

    #[test]
    fn default_value_and_usage() {
        let source = memory_source! {
            "root.yaml" => "parameters: {image: {type: string, default: cirros}}"
        };
        let mut forest = load(&source);
        let root = forest.root();

        let resolved = resolve(&mut forest, root, "get_param: image");

        assert_eq!(
            resolved,
            Ok(Resolved::Value {
                scope: root,
                value: "cirros".into()
            })
        );
        let image = forest.find_param(root, "image").unwrap();
        assert!(forest.param(image).used);
        assert!(forest.template(root).diagnostics.is_empty());
    }

    #[test]
    fn undeclared_parameter() {
        let source = memory_source! { "root.yaml" => "resources: {server: {type: OS::Nova::Server}}" };
        let mut forest = load(&source);
        let root = forest.root();

        assert_eq!(
            resolve(&mut forest, root, "get_param: missing"),
            Err(Unresolved)
        );

        let template = forest.template(root);
        assert!(!template.valid);
        assert_eq!(
            template.diagnostics,
            vec![Diagnostic::new(
                "missing".into(),
                "instance".into(),
                DiagnosticKind::GetParam,
                None
            )]
        );
    }

    #[test]
    fn pseudo_parameters_always_resolve() {
        let source = memory_source! { "root.yaml" => "{}" };
        let mut forest = load(&source);
        let root = forest.root();

        for pseudo in PSEUDO_PARAMETERS {
            let resolved = resolve(&mut forest, root, &format!("get_param: {pseudo}"));
            assert_eq!(resolved, Ok(Resolved::Opaque), "{pseudo}");
        }
        assert!(forest.template(root).valid);
    }

    #[test]
    fn hierarchy_addresses_structured_default() {
        let source = memory_source! {
            "root.yaml" => r#"
parameters:
  config:
    type: json
    default:
      networks: [{name: public}, {name: private}]
  which: {type: string, default: networks}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();

        assert_eq!(
            resolve(&mut forest, root, "get_param: [config, networks, 1, name]"),
            Ok(Resolved::Value {
                scope: root,
                value: "private".into()
            })
        );

        assert_eq!(
            resolve(&mut forest, root, "get_param: [config, {get_param: which}, 0, name]"),
            Ok(Resolved::Value {
                scope: root,
                value: "public".into()
            })
        );

        assert_eq!(
            resolve(&mut forest, root, "get_param: [config, networks, 5]"),
            Err(Unresolved)
        );
        assert_eq!(
            resolve(&mut forest, root, "get_param: [config, volumes]"),
            Err(Unresolved)
        );

        let referents: Vec<_> = forest
            .template(root)
            .diagnostics
            .iter()
            .map(|d| d.referent.as_str())
            .collect();
        assert_eq!(referents, vec!["5", "volumes"]);
    }

    #[test]
    fn comma_delimited_string_is_indexed() {
        let source = memory_source! {
            "root.yaml" => r#"
parameters:
  nets: {type: comma_delimited_list, default: "public, private"}
  name: {type: string, default: "public, private"}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();

        assert_eq!(
            resolve(&mut forest, root, "get_param: [nets, 1]"),
            Ok(Resolved::Value {
                scope: root,
                value: "private".into()
            })
        );
        assert_eq!(
            resolve(&mut forest, root, "get_param: [nets, 2]"),
            Err(Unresolved)
        );
        assert_eq!(
            resolve(&mut forest, root, "get_param: [name, 0]"),
            Err(Unresolved)
        );
    }

    #[test]
    fn addressing_into_missing_value() {
        let source = memory_source! {
            "root.yaml" => r#"
parameters:
  plain: {type: json}
  secret: {type: json, hidden: true}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();

        assert_eq!(
            resolve(&mut forest, root, "get_param: plain"),
            Ok(Resolved::Opaque)
        );
        assert_eq!(
            resolve(&mut forest, root, "get_param: [secret, key]"),
            Ok(Resolved::Opaque)
        );
        assert_eq!(
            resolve(&mut forest, root, "get_param: [plain, key]"),
            Err(Unresolved)
        );
    }

    #[test]
    fn property_value_resolved_in_parent() {
        let source = memory_source! {
            "root.yaml" => r#"
parameters:
  settings:
    type: json
    default: {flavor: m1.small}
resources:
  server:
    type: server.yaml
    properties:
      config: {get_param: settings}
"#,
            "server.yaml" => r#"
parameters:
  config: {type: json}
resources:
  vm:
    type: OS::Nova::Server
    properties:
      flavor: {get_param: [config, flavor]}
"#
        };
        let mut forest = load(&source);
        let root = forest.root();
        reconcile(&mut forest, root);
        let child = forest.template(root).resources[0].child.unwrap();

        assert_eq!(
            resolve(&mut forest, child, "get_param: [config, flavor]"),
            Ok(Resolved::Value {
                scope: root,
                value: "m1.small".into()
            })
        );

        let settings = forest.find_param(root, "settings").unwrap();
        assert!(forest.param(settings).used);
        assert_eq!(
            resolve(&mut forest, child, "get_param: [config, disk]"),
            Err(Unresolved)
        );
    }

    #[test]
    fn broken_parent_value_fails_both_sides() {
        let source = memory_source! {
            "root.yaml" => r#"
resources:
  server:
    type: server.yaml
    properties:
      config: {get_param: nope}
"#,
            "server.yaml" => "parameters: {config: {type: json}}"
        };
        let mut forest = load(&source);
        let root = forest.root();
        reconcile(&mut forest, root);
        let child = forest.template(root).resources[0].child.unwrap();

        assert_eq!(
            resolve(&mut forest, child, "get_param: config"),
            Err(Unresolved)
        );

        assert_eq!(
            forest.template(root).diagnostics,
            vec![Diagnostic::new(
                "nope".into(),
                "server".into(),
                DiagnosticKind::GetParam,
                None
            )]
        );
        assert_eq!(forest.template(child).diagnostics[0].referent, "config");
    }
}
