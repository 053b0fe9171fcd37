//! `depends_on` checks
use crate::model::{Diagnostic, DiagnosticKind, Forest, TemplateId};
use crate::value::Value;

/// Check `depends_on` of every resource in every template of the forest
pub fn check(forest: &mut Forest) {
    for template in forest.template_ids() {
        check_template(forest, template);
    }
}

/// Dependencies must name sibling resources, those are marked used
pub fn check_template(forest: &mut Forest, template: TemplateId) {
    for index in 0..forest.template(template).resources.len() {
        let resource = &forest.template(template).resources[index];
        let name = resource.name.clone();
        let dependencies = dependencies(resource.body.get("depends_on"));

        for dependency in dependencies {
            match forest.find_resource(template, &dependency) {
                Some(target) => forest.template_mut(template).resources[target].used = true,
                None => forest.template_mut(template).report(Diagnostic::new(
                    dependency,
                    name.clone(),
                    DiagnosticKind::DependsOn,
                    None,
                )),
            }
        }
    }
}

/// A single name or a list of names
fn dependencies(depends_on: Option<&Value>) -> Vec<String> {
    match depends_on {
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(|name| match name {
                Value::String(name) => Some(name.clone()),
                other => {
                    tracing::debug!(?other, "ignoring depends_on entry");
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::debug!(?other, "ignoring depends_on value");
            vec![]
        }
        None => vec![],
    }
}
