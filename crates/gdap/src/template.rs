//! Error message templating
//!
//! Renders the human-readable side of an error response from a format
//! template and a variable bag. Placeholders use `{name}` syntax.
//! Rendering never fails: an unresolved placeholder passes through
//! verbatim so a missing binding still yields a usable message.

use std::collections::BTreeMap;

/// Render `template`, substituting `{name}` placeholders from `variables`.
///
/// A `{` without a matching `}` on the same scan is emitted literally.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    // Unresolved placeholder passes through verbatim
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_variables() {
        let rendered = render(
            "unrecognized request: '{_request}'",
            &vars(&[("_request", "foo")]),
        );
        assert_eq!(rendered, "unrecognized request: 'foo'");
    }

    #[test]
    fn test_render_multiple_placeholders() {
        let rendered = render(
            "error while processing request '{_request}' (exception: {_exception})",
            &vars(&[("_request", "launch"), ("_exception", "no such file")]),
        );
        assert_eq!(
            rendered,
            "error while processing request 'launch' (exception: no such file)"
        );
    }

    #[test]
    fn test_unresolved_placeholder_passes_through() {
        let rendered = render("path not found: {path}", &vars(&[]));
        assert_eq!(rendered, "path not found: {path}");
    }

    #[test]
    fn test_unmatched_brace_is_literal() {
        let rendered = render("open { brace", &vars(&[("x", "y")]));
        assert_eq!(rendered, "open { brace");
    }

    #[test]
    fn test_no_placeholders() {
        let rendered = render("plain text", &vars(&[("unused", "v")]));
        assert_eq!(rendered, "plain text");
    }

    #[test]
    fn test_adjacent_placeholders() {
        let rendered = render("{a}{b}", &vars(&[("a", "1"), ("b", "2")]));
        assert_eq!(rendered, "12");
    }
}
