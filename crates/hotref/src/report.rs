//! validation summary
//!
//! [Report] is what the binary prints: either serialized as json/yaml or rendered as plain text. All paths are
//! relative to a base directory, usually the working directory.
use crate::model::{Diagnostic, DiagnosticKind, Forest, TemplateId};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub ok: bool,
    pub environments: Vec<EnvironmentSummary>,
    /// depth-first from the root
    pub templates: Vec<TemplateSummary>,
    pub structure: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSummary {
    pub path: PathBuf,
    pub ok: bool,
    pub diagnostics: Vec<DiagnosticSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub path: PathBuf,
    /// `None` for the root
    pub parent: Option<PathBuf>,
    /// environment that mapped this template onto its resource
    pub mapped_by: Option<PathBuf>,
    pub ok: bool,
    pub diagnostics: Vec<DiagnosticSummary>,
    pub unused_parameters: Vec<String>,
    pub hidden_parameters: Vec<String>,
    pub unused_resources: Vec<UnusedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusedResource {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticSummary {
    pub kind: DiagnosticKind,
    pub referent: String,
    pub element: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub message: String,
}

/// One template in the structure of the forest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub path: PathBuf,
    /// resource of the parent owning this template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

fn relative(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

impl DiagnosticSummary {
    fn new(diagnostic: &Diagnostic, base: &Path) -> Self {
        let diagnostic = Diagnostic {
            file: diagnostic.file.as_deref().map(|file| relative(file, base)),
            ..diagnostic.clone()
        };

        Self {
            message: diagnostic.to_string(),
            kind: diagnostic.kind,
            referent: diagnostic.referent,
            element: diagnostic.element,
            file: diagnostic.file,
        }
    }
}

impl Report {
    pub fn new(forest: &Forest, base: &Path) -> Self {
        let environments: Vec<_> = forest
            .environment_ids()
            .map(|id| {
                let environment = forest.environment(id);
                EnvironmentSummary {
                    path: relative(&environment.path, base),
                    ok: environment.valid,
                    diagnostics: environment
                        .diagnostics
                        .iter()
                        .map(|diagnostic| DiagnosticSummary::new(diagnostic, base))
                        .collect(),
                }
            })
            .collect();

        let templates: Vec<_> = forest
            .template_ids()
            .into_iter()
            .map(|id| template_summary(forest, id, base))
            .collect();

        Self {
            ok: environments.iter().all(|e| e.ok) && templates.iter().all(|t| t.ok),
            environments,
            templates,
            structure: node(forest, forest.root(), None, base),
        }
    }

    /// Plain text, optionally listing hidden parameters and unreferenced resources
    pub fn render_text(&self, unused: bool) -> String {
        TextReport {
            report: self,
            unused,
        }
        .to_string()
    }

    /// Indented tree of the template forest
    pub fn render_tree(&self) -> String {
        let mut out = format!("{}\n", self.structure.path.display());
        render_children(&self.structure, "", &mut out);
        out
    }
}

fn template_summary(forest: &Forest, id: TemplateId, base: &Path) -> TemplateSummary {
    let template = forest.template(id);
    let parameters = template.parameters.iter().map(|param| forest.param(*param));

    TemplateSummary {
        path: relative(&template.path, base),
        parent: template
            .parent
            .map(|link| relative(&forest.template(link.template).path, base)),
        mapped_by: template
            .environment
            .map(|environment| relative(&forest.environment(environment).path, base)),
        ok: template.valid,
        diagnostics: template
            .diagnostics
            .iter()
            .map(|diagnostic| DiagnosticSummary::new(diagnostic, base))
            .collect(),
        unused_parameters: parameters
            .clone()
            .filter(|param| !param.used)
            .map(|param| param.name.clone())
            .collect(),
        hidden_parameters: parameters
            .filter(|param| param.hidden)
            .map(|param| param.name.clone())
            .collect(),
        unused_resources: template
            .resources
            .iter()
            .filter(|resource| !resource.used)
            .map(|resource| UnusedResource {
                name: resource.name.clone(),
                type_name: resource.type_name.clone(),
            })
            .collect(),
    }
}

fn node(forest: &Forest, id: TemplateId, resource: Option<String>, base: &Path) -> Node {
    let template = forest.template(id);

    Node {
        path: relative(&template.path, base),
        resource,
        children: template
            .resources
            .iter()
            .filter_map(|resource| {
                let child = resource.child?;
                Some(node(forest, child, Some(resource.name.clone()), base))
            })
            .collect(),
    }
}

fn render_children(node: &Node, prefix: &str, out: &mut String) {
    for (index, child) in node.children.iter().enumerate() {
        let last = index + 1 == node.children.len();
        let (branch, indent) = if last {
            ("└─ ", "   ")
        } else {
            ("├─ ", "│  ")
        };

        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&child.path.display().to_string());
        if let Some(resource) = &child.resource {
            out.push_str(&format!(" ({resource})"));
        }
        out.push('\n');

        render_children(child, &format!("{prefix}{indent}"), out);
    }
}

struct TextReport<'r> {
    report: &'r Report,
    unused: bool,
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAILED"
    }
}

impl Display for TextReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let report = self.report;

        if !report.environments.is_empty() {
            writeln!(f, "Environments:")?;
            writeln!(f, "Total: {}", report.environments.len())?;

            for environment in &report.environments {
                writeln!(f)?;
                writeln!(f, "File {}", environment.path.display())?;
                writeln!(f)?;

                if !environment.diagnostics.is_empty() {
                    for diagnostic in &environment.diagnostics {
                        writeln!(f, "{}", diagnostic.message)?;
                    }
                    writeln!(f)?;
                }

                writeln!(f, "Status: {}", status(environment.ok))?;
            }

            writeln!(f)?;
        }

        writeln!(f, "HOT Files:")?;
        writeln!(f, "Total: {}", report.templates.len())?;

        for template in &report.templates {
            writeln!(f)?;
            writeln!(f, "File {}", template.path.display())?;
            match &template.parent {
                Some(parent) => writeln!(f, "Parent: {}", parent.display())?,
                None => writeln!(f, "Parent: None (root)")?,
            }
            if let Some(environment) = &template.mapped_by {
                writeln!(f, "Mapped by: {}", environment.display())?;
            }
            writeln!(f)?;

            if !template.diagnostics.is_empty() {
                writeln!(f, "Invalid references:")?;
                for diagnostic in &template.diagnostics {
                    writeln!(f, "{}", diagnostic.message)?;
                }
                writeln!(f)?;
            }

            list(f, "Unused parameters:", template.unused_parameters.iter())?;

            if self.unused {
                list(f, "Hidden parameters:", template.hidden_parameters.iter())?;
                list(
                    f,
                    "Resources without reference:",
                    template
                        .unused_resources
                        .iter()
                        .map(|resource| format!("{} ({})", resource.name, resource.type_name)),
                )?;
            }

            writeln!(f, "Status: {}", status(template.ok))?;
        }

        Ok(())
    }
}

/// A titled list of names followed by an empty line, nothing when empty
fn list<T: Display>(
    f: &mut Formatter<'_>,
    title: &str,
    items: impl ExactSizeIterator<Item = T>,
) -> std::fmt::Result {
    if items.len() == 0 {
        return Ok(());
    }

    writeln!(f, "{title}")?;
    for item in items {
        writeln!(f, "- {item}")?;
    }
    writeln!(f)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory_source;
    use crate::validator::{Options, Validator};
    use pretty_assertions::assert_eq;

    fn report() -> Report {
        let source = memory_source! {
            "stack/root.yaml" => r#"
parameters:
  image: {type: string, default: cirros}
  password: {type: string, hidden: true}
resources:
  server:
    type: server.yaml
    depends_on: missing
  port:
    type: OS::Neutron::Port
"#,
            "stack/server.yaml" => r#"
parameters:
  flavor: {type: string}
resources:
  volume:
    type: volume.yaml
"#,
            "stack/volume.yaml" => "{}",
            "stack/env.yaml" => "parameters: {nothing: 1}"
        };

        let options = Options::new(
            "stack/root.yaml".into(),
            vec!["stack/env.yaml".into()],
            Default::default(),
        );
        let forest = Validator::new(&source).validate(&options).unwrap();
        Report::new(&forest, Path::new("stack"))
    }

    #[test]
    fn summary() {
        let report = report();

        assert!(!report.ok);
        assert_eq!(report.environments[0].path, PathBuf::from("env.yaml"));
        assert_eq!(
            report.environments[0].diagnostics[0].message,
            "Parameter nothing has no match in root template."
        );

        let paths: Vec<_> = report.templates.iter().map(|t| t.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("root.yaml"),
                PathBuf::from("server.yaml"),
                PathBuf::from("volume.yaml")
            ]
        );

        let root = &report.templates[0];
        assert_eq!(root.unused_parameters, vec!["image", "password"]);
        assert_eq!(root.hidden_parameters, vec!["password"]);
        assert_eq!(
            root.unused_resources,
            vec![
                UnusedResource {
                    name: "server".into(),
                    type_name: "server.yaml".into()
                },
                UnusedResource {
                    name: "port".into(),
                    type_name: "OS::Neutron::Port".into()
                }
            ]
        );

        let server = &report.templates[1];
        assert_eq!(server.parent, Some(PathBuf::from("root.yaml")));
        assert_eq!(
            server.diagnostics[0].message,
            "Parameter flavor has no corresponding default or property in server in root.yaml."
        );
        assert!(report.templates[2].ok);
    }

    #[test]
    fn tree() {
        assert_eq!(
            report().render_tree(),
            "root.yaml\n└─ server.yaml (server)\n   └─ volume.yaml (volume)\n"
        );
    }

    #[test]
    fn text_lists_unused_entities_on_request() {
        let report = report();

        let plain = report.render_text(false);
        assert!(plain.contains("Unused parameters:\n- image\n- password\n"));
        assert!(!plain.contains("Hidden parameters:"));

        let verbose = report.render_text(true);
        assert!(verbose.contains("Hidden parameters:\n- password\n"));
        assert!(verbose.contains("Resources without reference:\n- server (server.yaml)\n- port (OS::Neutron::Port)\n"));
    }
}
