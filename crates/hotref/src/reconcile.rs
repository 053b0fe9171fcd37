//! parameters supplied from outside, and properties against parameters across template boundaries
use crate::model::{Diagnostic, DiagnosticKind, Forest, PropertyParameter, TemplateId};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Values given on the command line, assigned to the root template
///
/// Names the root does not declare are added as new parameters.
pub fn apply_overrides(forest: &mut Forest, overrides: &IndexMap<String, String>) {
    let root = forest.root();

    for (name, value) in overrides {
        match forest.find_param(root, name) {
            Some(param) => forest.param_mut(param).value = Some(value.as_str().into()),
            None => {
                tracing::debug!(%name, "override for undeclared parameter");
                let mut param = PropertyParameter::new(name.clone());
                param.value = Some(value.as_str().into());
                let param = forest.add_param(param);
                forest.template_mut(root).parameters.push(param);
            }
        }
    }
}

/// `parameters` and `parameter_defaults` of all environments
///
/// - `parameters` set the value of the root template's parameter of the same name
/// - `parameter_defaults` set the default of every parameter of that name without a declared default. Between
///   environments the last one wins.
///
/// Entries without any matching parameter are reported on the environment.
pub fn apply_environment_parameters(forest: &mut Forest) {
    let root = forest.root();
    let templates = forest.template_ids();
    let mut injected = BTreeSet::new();

    for environment in forest.environment_ids().collect::<Vec<_>>() {
        let parameters = forest.environment(environment).parameters.clone();
        for (name, entry) in parameters {
            let Some(param) = forest.find_param(root, &name) else {
                forest.environment_mut(environment).report(Diagnostic::new(
                    name,
                    String::new(),
                    DiagnosticKind::EnvParam,
                    None,
                ));
                continue;
            };

            forest.param_mut(param).value = Some(entry.value);
            forest.environment_mut(environment).parameters[&name].used = true;
        }

        let defaults = forest.environment(environment).parameter_defaults.clone();
        for (name, entry) in defaults {
            let matching: Vec<_> = templates
                .iter()
                .filter_map(|template| forest.find_param(*template, &name))
                .collect();

            if matching.is_empty() {
                forest.environment_mut(environment).report(Diagnostic::new(
                    name,
                    String::new(),
                    DiagnosticKind::EnvParamDefault,
                    None,
                ));
                continue;
            }

            for id in matching {
                let param = forest.param_mut(id);
                if param.default.is_none() || injected.contains(&id) {
                    param.default = Some(entry.value.clone());
                    injected.insert(id);
                }
            }
            forest.environment_mut(environment).parameter_defaults[&name].used = true;
        }
    }
}

/// Check properties of every resource with a child template against the child's parameters, top-down
///
/// Matching pairs are merged into a single record shared by the property and the parameter.
pub fn reconcile(forest: &mut Forest, template: TemplateId) {
    for index in 0..forest.template(template).resources.len() {
        let Some(child) = forest.template(template).resources[index].child else {
            continue;
        };

        reconcile_resource(forest, template, index, child);
        reconcile(forest, child);
    }
}

fn reconcile_resource(forest: &mut Forest, template: TemplateId, index: usize, child: TemplateId) {
    let resource = &forest.template(template).resources[index];
    let resource_name = resource.name.clone();
    let properties = resource.properties.clone();
    let parent_path = forest.template(template).path.clone();
    let child_path = forest.template(child).path.clone();

    let parameter_names: BTreeSet<String> = forest
        .template(child)
        .parameters
        .iter()
        .map(|param| forest.param(*param).name.clone())
        .collect();
    let property_names: BTreeSet<String> = properties
        .iter()
        .map(|property| forest.param(*property).name.clone())
        .collect();

    for name in parameter_names.difference(&property_names) {
        let required = forest
            .find_param(child, name)
            .is_some_and(|param| forest.param(param).default.is_none());
        if required {
            forest.template_mut(child).report(Diagnostic::new(
                name.clone(),
                resource_name.clone(),
                DiagnosticKind::MissingProperty,
                Some(parent_path.clone()),
            ));
        }
    }

    for name in property_names.difference(&parameter_names) {
        forest.template_mut(child).report(Diagnostic::new(
            name.clone(),
            resource_name.clone(),
            DiagnosticKind::MissingParameter,
            Some(child_path.clone()),
        ));
    }

    for property in properties {
        let name = forest.param(property).name.clone();
        let Some(slot) = forest
            .template(child)
            .parameters
            .iter()
            .position(|param| forest.param(*param).name == name)
        else {
            continue;
        };

        let param = forest.template(child).parameters[slot];
        if param == property {
            continue;
        }

        let declared = forest.param(param).clone();
        forest.param_mut(property).merge(&declared);
        forest.template_mut(child).parameters[slot] = property;
    }
}
