use indexmap::IndexMap;

use crate::value::Value;

/// A structured log event, as seen by the dispatcher.
///
/// Events are built once at the logging framework boundary: the name of the logger that produced the event, plus an
/// ordered bag of attributes. An attribute can be present without a value, which is distinct from the attribute not
/// being present at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogEvent {
    logger: String,
    attributes: IndexMap<String, Option<Value>>,
}

impl LogEvent {
    /// Creates an empty event for the given logger.
    pub fn new<L>(logger: L) -> Self
    where
        L: Into<String>,
    {
        Self { logger: logger.into(), attributes: IndexMap::new() }
    }

    /// Adds an attribute with a value, replacing any existing attribute with the same name.
    #[must_use]
    pub fn with<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.insert(name, Some(value.into()));
        self
    }

    /// Adds an attribute without a value, replacing any existing attribute with the same name.
    #[must_use]
    pub fn with_empty<K>(mut self, name: K) -> Self
    where
        K: Into<String>,
    {
        self.insert(name, None);
        self
    }

    /// Inserts an attribute.
    ///
    /// Replacing an existing attribute keeps its original position.
    pub fn insert<K>(&mut self, name: K, value: Option<Value>)
    where
        K: Into<String>,
    {
        self.attributes.insert(name.into(), value);
    }

    /// Returns the name of the logger that produced this event.
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// Returns `true` if the attribute is present, whether or not it has a value.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns the value of an attribute, if the attribute is present and has a value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(Option::as_ref)
    }

    /// Iterates over the attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if the event has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::LogEvent;
    use crate::value::Value;

    #[test]
    fn present_without_value() {
        let event = LogEvent::new("app").with_empty("START").with("END", 42);

        assert!(event.contains("START"));
        assert_eq!(event.get("START"), None);
        assert_eq!(event.get("END"), Some(&Value::Int(42)));
        assert!(!event.contains("MISSING"));
    }

    #[test]
    fn replacing_keeps_order() {
        let event = LogEvent::new("app").with("a", 1).with("b", 2).with("a", 3);

        let attrs = event.attributes().map(|(k, v)| (k, v.cloned())).collect::<Vec<_>>();
        assert_eq!(attrs, vec![("a", Some(Value::Int(3))), ("b", Some(Value::Int(2)))]);
    }
}
