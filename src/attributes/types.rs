//! Records produced by the custom attribute decoder.
//!
//! A record identifies an applied attribute by its constructor and declaring type.
//! Constructor arguments and named arguments are not decoded from the attribute
//! blob; the corresponding fields exist so that callers can already match on them
//! and are always empty.

use std::fmt;

use crate::host::NativePtr;

/// One custom attribute applied to a method, class or field.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeRecord {
    /// The attribute constructor (`MonoMethod*`)
    pub constructor: NativePtr,
    /// The attribute type (`MonoClass*`)
    pub class: NativePtr,
    /// Simple type name, e.g. `ObsoleteAttribute`
    pub name: String,
    /// Namespace of the attribute type, empty for the global namespace
    pub namespace: String,
    /// Constructor arguments; never populated
    pub fixed_args: Vec<CustomAttributeArgument>,
    /// Field and property assignments; never populated
    pub named_args: Vec<CustomAttributeNamedArgument>,
}

impl CustomAttributeRecord {
    /// Creates a record without arguments.
    #[must_use]
    pub fn new(
        constructor: NativePtr,
        class: NativePtr,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        CustomAttributeRecord {
            constructor,
            class,
            name: name.into(),
            namespace: namespace.into(),
            fixed_args: Vec::new(),
            named_args: Vec::new(),
        }
    }

    /// Namespace-qualified type name, e.g. `System.ObsoleteAttribute`.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` if the attribute type is `name`, with or without the
    /// conventional `Attribute` suffix and with or without namespace.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        let full_name = self.full_name();
        [name.to_string(), format!("{name}Attribute")]
            .iter()
            .any(|candidate| *candidate == self.name || *candidate == full_name)
    }
}

impl fmt::Display for CustomAttributeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.full_name())
    }
}

/// A constructor argument value of a custom attribute.
///
/// Attribute blobs are not decoded, so no value of this type can exist yet.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAttributeArgument {}

/// A field or property assignment of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeNamedArgument {
    /// Field or property name
    pub name: String,
    /// The assigned value
    pub value: CustomAttributeArgument,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let record = CustomAttributeRecord::new(
            NativePtr::new(0x10),
            NativePtr::new(0x20),
            "ObsoleteAttribute",
            "System",
        );
        assert_eq!(record.full_name(), "System.ObsoleteAttribute");
        assert_eq!(record.to_string(), "[System.ObsoleteAttribute]");
        assert!(record.is("Obsolete"));
        assert!(record.is("System.Obsolete"));
        assert!(record.is("ObsoleteAttribute"));
        assert!(!record.is("Serializable"));
        assert!(record.fixed_args.is_empty());
        assert!(record.named_args.is_empty());

        let global = CustomAttributeRecord::new(NativePtr::NULL, NativePtr::NULL, "Marker", "");
        assert_eq!(global.full_name(), "Marker");
    }
}
