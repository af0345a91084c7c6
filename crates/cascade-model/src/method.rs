use std::fmt;

/// A reference to a method within the bundle, identified by its declaring
/// class and its name. Two [`MethodRef`]s are equal iff their `(class_name,
/// name, descriptor)` triples match — the descriptor disambiguates
/// overloads when present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class_name: String,
    pub name: String,
    pub descriptor: Option<String>,
}

impl MethodRef {
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    /// Rendered `class->method` key used for stage-5 substring/equality
    /// comparisons against `called_by_func` entries.
    pub fn render_key(&self) -> String {
        format!("{}->{}", self.class_name, self.name)
    }

    /// Display form used in detail reports, including the descriptor
    /// when one is known.
    pub fn full_name(&self) -> String {
        match &self.descriptor {
            Some(d) => format!("{}->{}{}", self.class_name, self.name, d),
            None => self.render_key(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
