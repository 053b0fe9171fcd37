//! `get_attr` resolution
//!
//! The first element names a resource of the current template, the second says how the resource is addressed:
//!
//! | second element          | resource               | state            |
//! |-------------------------|------------------------|------------------|
//! | `attributes`            | ResourceGroup          | `RgAttributes`   |
//! | `outputs_list`          | AutoScalingGroup       | `AsgOutputsList` |
//! | `outputs`               | AutoScalingGroup       | `AsgOutputs`     |
//! | `resource.<n>[.<a>]`    | ResourceGroup, numeric | `RgResource`     |
//! | `resource.<m>[.<a>]`    | AutoScalingGroup       | `AsgResource`    |
//! | `resource.<name>`       | any                    | `Resource`       |
//! | anything else           | any                    | `OutputName`     |
//!
//! Resources without a child template are provider resources, their attributes are opaque.
//!
//! Group addressing reaches the outputs of the member template. Per-member aggregates (`attributes`, `outputs`,
//! `outputs_list`) have an unknown number of entries, so only the output itself is checked and anything addressed
//! below it is opaque.
use super::{Key, Resolution, Resolved, Resolver, Unresolved};
use crate::model::{Diagnostic, DiagnosticKind, GroupKind, TemplateId};
use crate::value::{Element, Value};

#[derive(Debug)]
enum State {
    ResourceName,
    Classify {
        child: TemplateId,
        group: Option<GroupKind>,
    },
    OutputName {
        template: TemplateId,
        name: String,
        next: usize,
        aggregate: bool,
    },
    Resource {
        child: TemplateId,
        member: String,
    },
    RgResource {
        child: TemplateId,
        attribute: Option<String>,
    },
    AsgResource {
        child: TemplateId,
        attribute: Option<String>,
    },
    RgAttributes {
        child: TemplateId,
    },
    AsgOutputs {
        child: TemplateId,
    },
    AsgOutputsList {
        child: TemplateId,
    },
    OutputResolution {
        current: Resolved,
        next: usize,
    },
    Resolved(Resolved),
    Error(String),
}

impl<'f> Resolver<'f> {
    pub(super) fn get_attr(
        &mut self,
        template: TemplateId,
        hierarchy: &[Element],
        instance: &str,
    ) -> Resolution {
        let root = hierarchy
            .first()
            .map_or_else(|| "[]".to_string(), ToString::to_string);
        let mut referenced = None;
        let mut state = State::ResourceName;

        loop {
            tracing::trace!(?state, instance, "get_attr");

            state = match state {
                State::ResourceName => {
                    if hierarchy.len() < 2 {
                        State::Error(root.clone())
                    } else {
                        match self.key(template, &hierarchy[0], instance) {
                            Ok(Key::Name(name)) => match self.forest.find_resource(template, &name) {
                                Some(index) => {
                                    referenced = Some(index);
                                    let resource = &self.forest.template(template).resources[index];
                                    match resource.child {
                                        Some(child) => State::Classify {
                                            child,
                                            group: resource.group,
                                        },
                                        None => State::Resolved(Resolved::Opaque),
                                    }
                                }
                                None => State::Error(name),
                            },
                            Ok(Key::Unknown) => State::Resolved(Resolved::Opaque),
                            _ => State::Error(root.clone()),
                        }
                    }
                }
                State::Classify { child, group } => {
                    self.classify(template, child, group, &hierarchy[1], instance)
                }
                State::OutputName {
                    template: child,
                    name,
                    next,
                    aggregate,
                } => self.output_name(child, name, next, aggregate),
                State::Resource { child, member } => {
                    match self.forest.find_resource(child, &member) {
                        Some(index) => {
                            self.forest.template_mut(child).resources[index].used = true;
                            State::OutputResolution {
                                current: Resolved::Opaque,
                                next: 2,
                            }
                        }
                        None => State::Error(member),
                    }
                }
                State::RgResource { child, attribute }
                | State::AsgResource { child, attribute } => match attribute {
                    Some(name) => State::OutputName {
                        template: child,
                        name,
                        next: 2,
                        aggregate: false,
                    },
                    None if hierarchy.len() > 2 => {
                        self.output_at(template, child, hierarchy, false, instance)
                    }
                    None => State::Resolved(Resolved::Opaque),
                },
                State::RgAttributes { child }
                | State::AsgOutputs { child }
                | State::AsgOutputsList { child } => {
                    self.output_at(template, child, hierarchy, true, instance)
                }
                State::OutputResolution { current, next } => match hierarchy.get(next) {
                    None => State::Resolved(current),
                    Some(element) => match self.step(template, current, element, instance) {
                        Ok(current) => State::OutputResolution {
                            current,
                            next: next + 1,
                        },
                        Err(Unresolved) => State::Error(element.to_string()),
                    },
                },
                State::Resolved(resolved) => {
                    if let Some(index) = referenced {
                        self.forest.template_mut(template).resources[index].used = true;
                    }
                    return Ok(resolved);
                }
                State::Error(referent) => {
                    self.report(
                        template,
                        Diagnostic::new(
                            referent,
                            format!("{instance} - output of {root}"),
                            DiagnosticKind::GetAttr,
                            None,
                        ),
                    );
                    return Err(Unresolved);
                }
            };
        }
    }

    fn classify(
        &mut self,
        template: TemplateId,
        child: TemplateId,
        group: Option<GroupKind>,
        second: &Element,
        instance: &str,
    ) -> State {
        let name = match self.key(template, second, instance) {
            Ok(Key::Name(name)) => name,
            Ok(Key::Unknown) => return State::Resolved(Resolved::Opaque),
            _ => return State::Error(second.to_string()),
        };

        match (name.as_str(), group) {
            ("attributes", Some(GroupKind::ResourceGroup)) => State::RgAttributes { child },
            ("outputs_list", Some(GroupKind::AutoScalingGroup)) => State::AsgOutputsList { child },
            ("outputs", Some(GroupKind::AutoScalingGroup)) => State::AsgOutputs { child },
            _ => match name.strip_prefix("resource.") {
                Some(member) => member_state(child, group, member, &name),
                None => State::OutputName {
                    template: child,
                    name,
                    next: 2,
                    aggregate: false,
                },
            },
        }
    }

    /// Output named by the third element
    fn output_at(
        &mut self,
        template: TemplateId,
        child: TemplateId,
        hierarchy: &[Element],
        aggregate: bool,
        instance: &str,
    ) -> State {
        let Some(element) = hierarchy.get(2) else {
            return State::Error(hierarchy[1].to_string());
        };

        match self.key(template, element, instance) {
            Ok(Key::Name(name)) => State::OutputName {
                template: child,
                name,
                next: 3,
                aggregate,
            },
            Ok(Key::Unknown) => State::OutputResolution {
                current: Resolved::Opaque,
                next: 3,
            },
            _ => State::Error(element.to_string()),
        }
    }

    fn output_name(&mut self, child: TemplateId, name: String, next: usize, aggregate: bool) -> State {
        let value = match self.forest.template(child).outputs.get(&name) {
            Some(output) => output.get("value").cloned().unwrap_or(Value::Null),
            None => return State::Error(name),
        };

        // the output value belongs to the child, so does every diagnostic it produces
        match self.settle(Resolved::Value { scope: child, value }, &name) {
            Ok(_) if aggregate => State::OutputResolution {
                current: Resolved::Opaque,
                next,
            },
            Ok(current) => State::OutputResolution { current, next },
            Err(Unresolved) => State::Error(name),
        }
    }
}

/// `resource.<member>[.<attribute>]`
fn member_state(child: TemplateId, group: Option<GroupKind>, member: &str, whole: &str) -> State {
    let (member, attribute) = match member.split_once('.') {
        Some((member, attribute)) => (member, Some(attribute.to_string())),
        None => (member, None),
    };

    let numeric = !member.is_empty() && member.chars().all(|c| c.is_ascii_digit());
    let alphanumeric = !member.is_empty() && member.chars().all(|c| c.is_ascii_alphanumeric());

    match group {
        Some(GroupKind::ResourceGroup) if numeric => State::RgResource { child, attribute },
        Some(GroupKind::AutoScalingGroup) if alphanumeric => State::AsgResource { child, attribute },
        _ if attribute.is_none() => State::Resource {
            child,
            member: member.to_string(),
        },
        _ => State::Error(whole.to_string()),
    }
}
