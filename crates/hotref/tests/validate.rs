//! Validation of the templates in tests/fixtures/, read from disk

use hotref::loader::LoadError;
use hotref::model::{Diagnostic, DiagnosticKind, Forest};
use hotref::source::FileSystem;
use hotref::validator::{Options, Validator};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn fixture(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(path)
}

fn validate(template: &str, environments: &[&str]) -> Result<Forest, LoadError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("HOTREF_LOG"))
        .with_writer(std::io::stderr)
        .try_init();

    let options = Options::new(
        fixture(template),
        environments.iter().map(|path| fixture(path)).collect(),
        Default::default(),
    );
    Validator::new(&FileSystem).validate(&options)
}

fn all_diagnostics(forest: &Forest) -> Vec<(String, Diagnostic)> {
    forest
        .template_ids()
        .into_iter()
        .flat_map(|id| {
            let template = forest.template(id);
            let name = template
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            template
                .diagnostics
                .iter()
                .map(move |diagnostic| (name.clone(), diagnostic.clone()))
        })
        .collect()
}

#[test]
fn wildcard_environment_maps_network() {
    let forest = validate("wildcard/root.yaml", &["wildcard/environments/env.yaml"]).unwrap();

    let root = forest.template(forest.root());
    let public = &root.resources[0];
    assert_eq!(public.type_name, "file:../net_Public.yaml");

    let child = forest.template(public.child.expect("mapped template attached"));
    assert!(child.path.ends_with("wildcard/net_Public.yaml"));
    assert!(child.environment.is_some());

    assert_eq!(all_diagnostics(&forest), vec![]);
    assert!(root.resources.iter().all(|resource| resource.used));
    assert!(child.resources[0].used, "network referenced by subnet and output");
    assert!(!child.resources[1].used, "nothing refers to the subnet");
}

#[test]
fn without_environment_the_network_is_a_provider_resource() {
    let forest = validate("wildcard/root.yaml", &[]).unwrap();

    let root = forest.template(forest.root());
    assert_eq!(root.resources[0].type_name, "OS::Custom::NetPublic");
    assert_eq!(root.resources[0].child, None);
    assert!(root.valid);
}

#[test]
fn outputs_list_only_for_autoscaling_groups() {
    let forest = validate("groups/root.yaml", &[]).unwrap();

    assert_eq!(
        all_diagnostics(&forest),
        vec![(
            "root.yaml".to_string(),
            Diagnostic::new(
                "outputs_list".into(),
                "rg_ips - output of rg".into(),
                DiagnosticKind::GetAttr,
                None
            )
        )]
    );

    let root = forest.template(forest.root());
    assert!(!root.valid);
    for member in root.resources.iter().filter_map(|resource| resource.child) {
        let member = forest.template(member);
        assert!(member.valid);
        assert!(forest.param(member.parameters[0]).used);
    }
}

#[test]
fn broken_references() {
    let forest = validate("broken/root.yaml", &["broken/env.yaml"]).unwrap();

    let kinds: Vec<_> = all_diagnostics(&forest)
        .into_iter()
        .map(|(file, diagnostic)| (file, diagnostic.kind, diagnostic.referent))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("root.yaml".into(), DiagnosticKind::GetParam, "flavor".into()),
            ("root.yaml".into(), DiagnosticKind::GetResource, "port".into()),
            ("root.yaml".into(), DiagnosticKind::GetAttr, "name".into()),
            ("root.yaml".into(), DiagnosticKind::DependsOn, "volume".into()),
            ("server.yaml".into(), DiagnosticKind::MissingParameter, "extra".into()),
            ("server.yaml".into(), DiagnosticKind::GetParam, "flavor".into()),
        ]
    );

    let environment = forest.environment(forest.environment_ids().next().unwrap());
    let kinds: Vec<_> = environment
        .diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.kind, diagnostic.referent.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (DiagnosticKind::EnvParam, "flavour"),
            (DiagnosticKind::EnvParamDefault, "unknown_default")
        ]
    );
}

#[test]
fn include_cycle_is_fatal() {
    let error = validate("cycle/a.yaml", &[]).expect_err("cycle");
    match error {
        LoadError::CyclicInclude { path, chain } => {
            assert!(path.ends_with("cycle/a.yaml"));
            assert_eq!(chain.len(), 2);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn missing_files_are_fatal() {
    let error = validate("missing/root.yaml", &[]).expect_err("missing");
    assert!(matches!(error, LoadError::Io { .. }));

    let error = validate("wildcard/root.yaml", &["missing/env.yaml"]).expect_err("missing");
    assert!(matches!(error, LoadError::Io { .. }));
}
