//! Publish templates.
//!
//! A publish template is an ordered list of format strings, each of which turns the tuple of logger name, attribute
//! name and metric name into the final metric name written to the metrics daemon. Every format string yields one
//! independent metric call.
//!
//! Format strings use `%(name)s` placeholders, where `name` is one of `logger`, `attr` or `metric_name`. A literal `%`
//! is written as `%%`.
use std::collections::HashMap;

use crate::error::ConfigError;

/// Name of the reserved fallback template.
pub const DEFAULT_TEMPLATE: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placeholder {
    Logger,
    Attr,
    MetricName,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "logger" => Some(Placeholder::Logger),
            "attr" => Some(Placeholder::Attr),
            "metric_name" => Some(Placeholder::MetricName),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A single parsed format string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    segments: Vec<Segment>,
    literal_len: usize,
}

impl Format {
    /// Parses a format string.
    ///
    /// # Errors
    ///
    /// If the format string contains an incomplete or unknown placeholder, or a conversion other than `s`, an error
    /// describing the problem is returned.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(idx) = rest.find('%') {
            literal.push_str(&rest[..idx]);
            rest = &rest[idx + 1..];

            if let Some(after) = rest.strip_prefix('%') {
                literal.push('%');
                rest = after;
                continue;
            }

            let Some(after) = rest.strip_prefix('(') else {
                return Err("incomplete format: '%' must be followed by '(' or '%'".to_string());
            };
            let Some(close) = after.find(')') else {
                return Err("unterminated placeholder".to_string());
            };

            let name = &after[..close];
            let placeholder = Placeholder::from_name(name).ok_or_else(|| {
                format!("unknown placeholder '{name}' (expected 'logger', 'attr' or 'metric_name')")
            })?;

            rest = after[close + 1..]
                .strip_prefix('s')
                .ok_or_else(|| format!("unsupported conversion for placeholder '{name}' (expected 's')"))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(placeholder));
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let literal_len = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.len(),
                Segment::Placeholder(_) => 0,
            })
            .sum();

        Ok(Self { segments, literal_len })
    }

    /// Renders this format string.
    pub fn render(&self, logger: &str, attr: &str, metric_name: &str) -> String {
        let mut out = String::with_capacity(self.literal_len + logger.len() + attr.len() + metric_name.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Placeholder(Placeholder::Logger) => out.push_str(logger),
                Segment::Placeholder(Placeholder::Attr) => out.push_str(attr),
                Segment::Placeholder(Placeholder::MetricName) => out.push_str(metric_name),
            }
        }
        out
    }
}

/// A named, ordered list of format strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishTemplate {
    formats: Vec<Format>,
}

impl PublishTemplate {
    /// Parses a publish template from its format strings.
    ///
    /// # Errors
    ///
    /// If any of the format strings is malformed, [`ConfigError::Template`] is returned.
    pub fn parse<I, S>(name: &str, formats: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let formats = formats
            .into_iter()
            .map(|f| {
                Format::parse(f.as_ref())
                    .map_err(|reason| ConfigError::Template { name: name.to_string(), reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { formats })
    }

    /// Renders every format string of this template, in order.
    pub fn render<'a>(
        &'a self,
        logger: &'a str,
        attr: &'a str,
        metric_name: &'a str,
    ) -> impl Iterator<Item = String> + 'a {
        self.formats.iter().map(move |f| f.render(logger, attr, metric_name))
    }

    /// Returns the number of format strings in this template.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Returns `true` if this template has no format strings, and so never emits anything.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// The table of publish templates.
///
/// The reserved `default` template always exists, and is used whenever a template is referenced by a name that was
/// never registered.
#[derive(Clone, Debug)]
pub struct Templates {
    default: PublishTemplate,
    named: HashMap<String, PublishTemplate>,
}

impl Templates {
    /// Creates a table holding only the built-in `default` template, `%(logger)s;%(attr)s;%(metric_name)s`.
    pub fn new() -> Self {
        let default = Format {
            segments: vec![
                Segment::Placeholder(Placeholder::Logger),
                Segment::Literal(";".to_string()),
                Segment::Placeholder(Placeholder::Attr),
                Segment::Literal(";".to_string()),
                Segment::Placeholder(Placeholder::MetricName),
            ],
            literal_len: 2,
        };
        Self { default: PublishTemplate { formats: vec![default] }, named: HashMap::new() }
    }

    /// Registers a template, replacing any template previously registered under the same name.
    ///
    /// Registering under `default` replaces the fallback template.
    ///
    /// # Errors
    ///
    /// If any of the format strings is malformed, [`ConfigError::Template`] is returned and the table is left
    /// unchanged.
    pub fn register<I, S>(&mut self, name: &str, formats: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let template = PublishTemplate::parse(name, formats)?;
        if name == DEFAULT_TEMPLATE {
            self.default = template;
        } else {
            self.named.insert(name.to_string(), template);
        }
        Ok(())
    }

    /// Resolves a template by name, falling back to `default`.
    pub fn resolve(&self, name: Option<&str>) -> &PublishTemplate {
        name.and_then(|n| self.named.get(n)).unwrap_or(&self.default)
    }

    /// Returns `true` if a template is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_TEMPLATE || self.named.contains_key(name)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Templates::new()
    }
}
