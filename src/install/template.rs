//! Download URL templates such as
//! `https://releases.hashicorp.com/terraform/{{ .Version }}/terraform_{{ .Version }}_{{ .Os }}_{{ .Arch }}.zip`.

use crate::error::{GenvError, Result};
use crate::platform::Platform;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Version,
    Os,
    Arch,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Version" => Some(Placeholder::Version),
            "Os" => Some(Placeholder::Os),
            "Arch" => Some(Placeholder::Arch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let error = |reason: String| GenvError::Template {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or_else(|| error(format!("unclosed '{}' at offset {}", OPEN, template.len() - rest.len() + start)))?;

            let expr = after_open[..end].trim();
            let name = expr.strip_prefix('.').unwrap_or(expr);
            let placeholder = Placeholder::parse(name).ok_or_else(|| {
                error(format!(
                    "unsupported placeholder '{}', expected one of Version, Os, Arch",
                    expr
                ))
            })?;
            segments.push(Segment::Placeholder(placeholder));
            rest = &after_open[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn render(&self, version: &str, platform: &Platform) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(Placeholder::Version) => version,
                Segment::Placeholder(Placeholder::Os) => platform.os.as_str(),
                Segment::Placeholder(Placeholder::Arch) => platform.arch.as_str(),
            })
            .collect()
    }
}
