use std::collections::HashMap;
use tera::{Context, Tera};

use super::SessionError;

/// Built-in configuration snippets loadable by name
const BUILTIN: &[(&str, &str)] = &[
    ("set_hostname", "hostname {{ hostname }}\n"),
];

/// Render a built-in template with the given parameters.
/// Missing parameters are a render error, not an empty substitution.
pub fn render(name: &str, params: &HashMap<String, String>) -> Result<String, SessionError> {
    let source = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, s)| *s)
        .ok_or_else(|| SessionError::Template(format!("unknown template '{}'", name)))?;

    let mut tera = Tera::default();
    tera.add_raw_template(name, source)
        .map_err(|e| SessionError::Template(format!("invalid template '{}': {}", name, e)))?;

    let mut context = Context::new();
    for (key, value) in params {
        context.insert(key.as_str(), value);
    }

    tera.render(name, &context)
        .map_err(|e| SessionError::Template(format!("rendering '{}' failed: {}", name, e)))
}
