use indexmap::IndexSet;

use crate::config::TimerRule;

/// Lookup sets derived from the timer rules.
///
/// Classifying an attribute as a start, end or value attribute is a set lookup. The sets keep the order in which
/// attributes first appear in the rules, so that end attributes are always scanned in a deterministic order.
#[derive(Clone, Debug, Default)]
pub(crate) struct TimerIndex {
    start: IndexSet<String>,
    end: IndexSet<String>,
    value: IndexSet<String>,
}

impl TimerIndex {
    pub fn new(rules: &[TimerRule]) -> Self {
        let mut index = TimerIndex::default();
        for rule in rules {
            if let Some(name) = &rule.start_attr_name {
                index.start.insert(name.clone());
            }
            if let Some(name) = &rule.end_attr_name {
                index.end.insert(name.clone());
            }
            if let Some(name) = &rule.value_attr_name {
                index.value.insert(name.clone());
            }
        }
        index
    }

    pub fn is_start(&self, attr: &str) -> bool {
        self.start.contains(attr)
    }

    pub fn is_value(&self, attr: &str) -> bool {
        self.value.contains(attr)
    }

    pub fn end_attributes(&self) -> impl Iterator<Item = &str> {
        self.end.iter().map(String::as_str)
    }
}

/// Finds the first rule pairing the given start and end attributes.
pub(crate) fn find_pair<'a>(rules: &'a [TimerRule], start: &str, end: &str) -> Option<&'a TimerRule> {
    rules.iter().find(|r| {
        r.start_attr_name.as_deref() == Some(start) && r.end_attr_name.as_deref() == Some(end)
    })
}

/// Finds the first rule with the given value attribute.
pub(crate) fn find_value<'a>(rules: &'a [TimerRule], attr: &str) -> Option<&'a TimerRule> {
    rules.iter().find(|r| r.value_attr_name.as_deref() == Some(attr))
}
