//! `{{ placeholder }}` templating
//!
//! Supported placeholders: `service_id`, `version`. Unknown names are
//! left untouched.

/// Values available to templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContext<'a> {
    /// Service ID
    pub service_id: &'a str,
    /// Candidate or latest version
    pub version: &'a str,
}

impl<'a> TemplateContext<'a> {
    /// Create new context
    #[inline]
    #[must_use]
    pub fn new(service_id: &'a str, version: &'a str) -> Self {
        Self {
            service_id,
            version,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "version" => Some(self.version),
            "service_id" => Some(self.service_id),
            _ => None,
        }
    }
}

/// Whether the text contains any placeholder
#[must_use]
pub fn has_placeholder(text: &str) -> bool {
    text.find("{{")
        .is_some_and(|open| text[open + 2..].contains("}}"))
}

/// Substitute placeholders
#[must_use]
pub fn render(text: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        let inner = &rest[open + 2..open + 2 + close];
        out.push_str(&rest[..open]);
        match ctx.lookup(inner.trim()) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..open + 4 + close]),
        }
        rest = &rest[open + 4 + close..];
    }
    out.push_str(rest);
    out
}

/// Substitute placeholders, escaping the values for use inside a regex
#[must_use]
pub fn render_regex(pattern: &str, ctx: &TemplateContext<'_>) -> String {
    let escaped_version = regex::escape(ctx.version);
    let escaped_id = regex::escape(ctx.service_id);
    render(pattern, &TemplateContext::new(&escaped_id, &escaped_version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_known_placeholders() {
        let ctx = TemplateContext::new("argus", "1.2.3");
        assert_eq!(
            render("{{ service_id }} - {{ version }} released", &ctx),
            "argus - 1.2.3 released"
        );
        assert_eq!(render("v{{version}}", &ctx), "v1.2.3");
    }

    #[test]
    fn render_leaves_unknown() {
        let ctx = TemplateContext::new("argus", "1.2.3");
        assert_eq!(render("{{ web_url }}", &ctx), "{{ web_url }}");
        assert_eq!(render("plain", &ctx), "plain");
    }

    #[test]
    fn render_regex_escapes_version() {
        let ctx = TemplateContext::new("svc", "1.2.3");
        assert_eq!(render_regex("app-{{ version }}.deb", &ctx), r"app-1\.2\.3.deb");
    }

    #[test]
    fn detects_placeholders() {
        assert!(has_placeholder("a {{ version }}"));
        assert!(!has_placeholder("a { version }"));
    }
}
