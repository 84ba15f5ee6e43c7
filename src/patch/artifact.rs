//! Decoder for the XML artifact format used by whole-file generation:
//! `<artifact ...><action type="file" filePath="...">...</action></artifact>`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::wire::Step;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("action {index}: unrecognized action type \"{action_type}\"")]
    Unrecognized { index: usize, action_type: String },
    #[error("action {index}: missing filePath")]
    MissingPath { index: usize },
}

fn artifact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<artifact\b[^>]*>(.*?)</artifact>").expect("artifact regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<action\b([^>]*)>(.*?)</action>").expect("action regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).expect("attr regex"))
}

fn attrs(raw: &str) -> HashMap<&str, &str> {
    attr_re()
        .captures_iter(raw)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect()
}

fn clean_content(body: &str) -> String {
    let body = body.strip_prefix("\r\n").or_else(|| body.strip_prefix('\n')).unwrap_or(body);
    let mut s = body.trim_end().to_string();
    s.push('\n');
    s
}

/// Extract create-file steps from every artifact in `text`, in order.
/// Text without an artifact yields no steps.
pub fn parse_steps(text: &str) -> Result<Vec<Step>, ArtifactError> {
    let mut steps = Vec::new();
    let mut index = 0usize;
    for artifact in artifact_re().captures_iter(text) {
        let Some(inner) = artifact.get(1) else { continue };
        for action in action_re().captures_iter(inner.as_str()) {
            let a = attrs(action.get(1).map(|m| m.as_str()).unwrap_or_default());
            let body = action.get(2).map(|m| m.as_str()).unwrap_or_default();
            match a.get("type").copied().unwrap_or_default() {
                "file" => {
                    let path = a.get("filePath").map(|p| p.trim()).filter(|p| !p.is_empty());
                    let path = path.ok_or(ArtifactError::MissingPath { index })?;
                    steps.push(Step::CreateFile { path: path.to_string(), content: clean_content(body) });
                }
                other => {
                    return Err(ArtifactError::Unrecognized { index, action_type: other.to_string() });
                }
            }
            index += 1;
        }
    }
    Ok(steps)
}

/// The prose around the artifacts, for display.
pub fn strip_artifacts(text: &str) -> String {
    artifact_re().replace_all(text, "").trim().to_string()
}

/// Render files back into artifact form (used for template prompts).
pub fn render(id: &str, title: &str, files: &[(&str, &str)]) -> String {
    let mut out = format!("<artifact id=\"{id}\" title=\"{title}\">\n");
    for (path, content) in files {
        out.push_str(&format!("<action type=\"file\" filePath=\"{path}\">\n{}\n</action>\n", content.trim_end()));
    }
    out.push_str("</artifact>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_actions_become_create_steps_in_order() {
        let text = r#"Here is your app.
<artifact id="todo" title="Todo">
<action type="file" filePath="src/App.js">
export default function App() {}
</action>
<action type="file" filePath="package.json">
{}
</action>
</artifact>
Enjoy."#;
        let steps = parse_steps(text).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::CreateFile { path: "src/App.js".into(), content: "export default function App() {}\n".into() },
                Step::CreateFile { path: "package.json".into(), content: "{}\n".into() },
            ]
        );
        assert_eq!(strip_artifacts(text), "Here is your app.\n\nEnjoy.");
    }

    #[test]
    fn unknown_action_type_is_a_typed_error() {
        let text = r#"<artifact id="x"><action type="shell">npm install</action></artifact>"#;
        assert_eq!(
            parse_steps(text).unwrap_err(),
            ArtifactError::Unrecognized { index: 0, action_type: "shell".into() }
        );
    }

    #[test]
    fn missing_path_is_rejected_and_plain_text_has_no_steps() {
        let text = r#"<artifact id="x"><action type="file">hi</action></artifact>"#;
        assert_eq!(parse_steps(text).unwrap_err(), ArtifactError::MissingPath { index: 0 });
        assert!(parse_steps("just an answer").unwrap().is_empty());
    }

    #[test]
    fn rendered_artifacts_parse_back() {
        let text = render("t", "T", &[("index.js", "console.log(1);\n")]);
        let steps = parse_steps(&text).unwrap();
        assert_eq!(steps, vec![Step::CreateFile { path: "index.js".into(), content: "console.log(1);\n".into() }]);
    }
}
