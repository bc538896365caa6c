use std::fmt;

/// A named FSM state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    name: String,
}

impl State {
    /// Matches any state in filters, including none.
    pub const ANY: &'static str = "*";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for State {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for State {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A namespace of states.
///
/// States of the group are named `"<group>:<state>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatesGroup {
    name: String,
}

impl StatesGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state `name` of this group.
    pub fn state(&self, name: &str) -> State {
        State::new(format!("{}:{name}", self.name))
    }

    /// Whether `state` belongs to this group.
    pub fn contains(&self, state: &str) -> bool {
        state
            .strip_prefix(self.name.as_str())
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_states() {
        let form = StatesGroup::new("Form");
        let name = form.state("name");
        assert_eq!(name.name(), "Form:name");
        assert!(form.contains(name.name()));
        assert!(!form.contains("Former:name"));
        assert!(!form.contains("Form"));
    }
}
