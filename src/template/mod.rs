use crate::errors::AppError;
use crate::patch::artifact;
use crate::wire::TemplateResponse;

const BASE_PROMPT: &str = "For all designs I ask you to make, have them be beautiful, not cookie cutter. \
Make webpages that are fully featured and worthy for production. Use icons from lucide-react for logos \
and stock photo URLs from Unsplash where images fit. Do not install other UI packages unless absolutely necessary.";

const REACT_FILES: &[(&str, &str)] = &[
    ("index.html", r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Vite + React</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>"#),
    ("package.json", r#"{
  "name": "vite-react-app",
  "private": true,
  "type": "module",
  "scripts": { "dev": "vite", "build": "vite build" },
  "dependencies": { "lucide-react": "^0.460.0", "react": "^18.3.1", "react-dom": "^18.3.1" },
  "devDependencies": { "@vitejs/plugin-react": "^4.3.1", "tailwindcss": "^3.4.1", "vite": "^5.4.2" }
}"#),
    ("src/main.jsx", r#"import { StrictMode } from 'react';
import { createRoot } from 'react-dom/client';
import App from './App.jsx';
import './index.css';

createRoot(document.getElementById('root')).render(
  <StrictMode>
    <App />
  </StrictMode>
);"#),
    ("src/App.jsx", r#"export default function App() {
  return (
    <div className="min-h-screen bg-gray-100 flex items-center justify-center">
      <p>Start prompting to see magic happen :)</p>
    </div>
  );
}"#),
    ("src/index.css", "@tailwind base;\n@tailwind components;\n@tailwind utilities;"),
];

const NODE_FILES: &[(&str, &str)] = &[
    ("package.json", r#"{
  "name": "node-starter",
  "private": true,
  "type": "module",
  "scripts": { "start": "node index.js" }
}"#),
    ("index.js", "console.log('Hello from Node.js');"),
];

const REACT_NATIVE_FILES: &[(&str, &str)] = &[
    ("package.json", r#"{
  "name": "expo-starter",
  "main": "node_modules/expo/AppEntry.js",
  "dependencies": { "expo": "~52.0.0", "react": "18.3.1", "react-native": "0.76.3" }
}"#),
    ("App.js", r#"import { StyleSheet, Text, View } from 'react-native';

export default function App() {
  return (
    <View style={styles.container}>
      <Text>Start prompting to see magic happen :)</Text>
    </View>
  );
}

const styles = StyleSheet.create({
  container: { flex: 1, alignItems: 'center', justifyContent: 'center' },
});"#),
];

fn files_for(language: &str) -> Option<(&'static str, &'static [(&'static str, &'static str)])> {
    match language.trim().to_ascii_lowercase().as_str() {
        "react" => Some(("react-starter", REACT_FILES)),
        "node" => Some(("node-starter", NODE_FILES)),
        "react-native" | "reactnative" | "expo" => Some(("expo-starter", REACT_NATIVE_FILES)),
        _ => None,
    }
}

/// Static boilerplate for a language: the prompts seed the model, the UI
/// prompts seed the client's file tree. Nothing here is model-generated.
pub fn for_language(language: &str) -> Result<TemplateResponse, AppError> {
    let (id, files) = files_for(language)
        .ok_or_else(|| AppError::Validation(format!("unsupported language \"{language}\"")))?;
    let art = artifact::render(id, "Project Files", files);
    let context = format!(
        "Here is an artifact that contains all files of the project visible to you.\n\
         Consider the contents of ALL files in the project.\n\n{art}\n\n\
         Here is a list of files that exist on the file system but are not being shown to you:\n\n  - .gitignore\n  - package-lock.json\n"
    );
    Ok(TemplateResponse { prompts: vec![BASE_PROMPT.to_string(), context], ui_prompts: vec![art] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{apply_steps, NullSandbox};
    use crate::tree::FileTree;

    #[test]
    fn every_language_template_applies_cleanly() {
        for lang in ["react", "node", "react-native"] {
            let t = for_language(lang).unwrap();
            assert_eq!(t.prompts.len(), 2);
            let steps = artifact::parse_steps(&t.ui_prompts[0]).unwrap();
            assert!(!steps.is_empty(), "{lang} template has no files");
            let mut tree = FileTree::new();
            let sum = apply_steps(&mut tree, &steps, &NullSandbox);
            assert_eq!(sum.created, steps.len());
            assert!(tree.file("package.json").is_some());
        }
    }

    #[test]
    fn unknown_language_is_a_validation_error() {
        assert!(matches!(for_language("cobol"), Err(AppError::Validation(_))));
    }
}
