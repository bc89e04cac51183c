//! Command descriptors used for argument declaration and help rendering.

use crate::error::{Error, Result};

/// Description of a single leaf command.
///
/// `arguments` holds placeholders in positional order: `<name>` for a
/// required argument and `[name]` for an optional one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CommandInfo {
    /// Leaf command name (e.g. `list`).
    pub name: String,
    /// One-line description shown in help output.
    pub description: String,
    /// Positional argument placeholders.
    pub arguments: Vec<String>,
}

impl CommandInfo {
    /// Creates a command descriptor without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments: Vec::new(),
        }
    }

    /// Appends a positional argument placeholder.
    #[must_use]
    pub fn arg(mut self, placeholder: impl Into<String>) -> Self {
        self.arguments.push(placeholder.into());
        self
    }

    /// Renders the usage line for this command under `resource`,
    /// e.g. `openapi show <uri> <id>`.
    #[must_use]
    pub fn usage(&self, resource: &str) -> String {
        let mut parts = vec![resource, self.name.as_str()];
        parts.extend(self.arguments.iter().map(String::as_str));
        parts.join(" ")
    }

    /// Parses the placeholders, checking that no required argument
    /// follows an optional one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlaceholder`] for malformed placeholders and
    /// [`Error::ArgumentOrder`] when a required argument comes after an
    /// optional one.
    pub fn placeholders(&self) -> Result<Vec<Placeholder>> {
        let mut parsed = Vec::with_capacity(self.arguments.len());
        let mut seen_optional = false;

        for raw in &self.arguments {
            let placeholder = Placeholder::parse(raw)?;
            if placeholder.required && seen_optional {
                return Err(Error::ArgumentOrder {
                    command: self.name.clone(),
                    argument: raw.clone(),
                });
            }
            seen_optional |= !placeholder.required;
            parsed.push(placeholder);
        }

        Ok(parsed)
    }
}

/// A parsed positional argument placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Argument name without brackets.
    pub name: String,
    /// `true` for `<name>`, `false` for `[name]`.
    pub required: bool,
}

impl Placeholder {
    /// Parses `<name>` or `[name]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlaceholder`] if the brackets are missing or
    /// the name is empty or contains whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let (inner, required) = if let Some(inner) = raw
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        {
            (inner, true)
        } else if let Some(inner) = raw
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            (inner, false)
        } else {
            return Err(Error::InvalidPlaceholder(raw.to_string()));
        };

        if inner.is_empty() || inner.chars().any(char::is_whitespace) {
            return Err(Error::InvalidPlaceholder(raw.to_string()));
        }

        Ok(Self {
            name: inner.to_string(),
            required,
        })
    }
}
