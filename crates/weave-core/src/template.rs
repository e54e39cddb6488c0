//! Literal `{{token}}` substitution for prompt templates.

/// Replaces every `{{token}}` occurrence with its value. Substitution is plain
/// literal text replacement: values are inserted verbatim, no escaping.
/// Unknown tokens are left in place.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (token, value) in values {
        out = out.replace(&format!("{{{{{token}}}}}"), value);
    }
    out
}
