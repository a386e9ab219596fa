use std::collections::BTreeMap;

/// Tracks which namespace URIs are bound to which prefix while writing.
///
/// Every started element opens a scope; a binding made while the scope is open
/// is declared on that element and forgotten when it closes.
#[derive(Debug, Default)]
pub struct NamespaceTable {
    scopes: Vec<Vec<(String, String)>>,
    preferred: BTreeMap<String, String>,
    used: BTreeMap<String, String>,
    counter: usize,
}

impl NamespaceTable {
    /// Creates a table using `preferred` (URI → prefix) before generating `nsN` prefixes.
    pub fn new(preferred: BTreeMap<String, String>) -> Self {
        Self {
            scopes: Vec::new(),
            preferred,
            used: BTreeMap::new(),
            counter: 0,
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Returns the prefix bound to `uri` and whether it must be declared in the current scope.
    pub fn prefix_for(&mut self, uri: &str) -> (String, bool) {
        if let Some(prefix) = self.in_scope(uri) {
            return (prefix.to_string(), false);
        }
        let prefix = match self.preferred.get(uri) {
            Some(prefix) if !self.prefix_in_scope(prefix) => prefix.clone(),
            _ => self.generate(),
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((uri.to_string(), prefix.clone()));
        }
        self.used.insert(uri.to_string(), prefix.clone());
        (prefix, true)
    }

    /// Every namespace bound so far, with the last prefix it was written with.
    pub fn used(&self) -> &BTreeMap<String, String> {
        &self.used
    }

    fn in_scope(&self, uri: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|(bound, _)| bound == uri)
            .map(|(_, prefix)| prefix.as_str())
    }

    fn prefix_in_scope(&self, prefix: &str) -> bool {
        self.scopes
            .iter()
            .flat_map(|scope| scope.iter())
            .any(|(_, bound)| bound == prefix)
    }

    fn generate(&mut self) -> String {
        loop {
            let candidate = format!("ns{}", self.counter);
            self.counter += 1;
            if !self.prefix_in_scope(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_is_declared_once_per_scope_chain() {
        let mut table = NamespaceTable::default();
        table.push_scope();
        assert_eq!(table.prefix_for("urn:a"), ("ns0".to_string(), true));
        table.push_scope();
        assert_eq!(table.prefix_for("urn:a"), ("ns0".to_string(), false));
        table.pop_scope();
        table.pop_scope();

        table.push_scope();
        assert_eq!(table.prefix_for("urn:a"), ("ns1".to_string(), true));
    }

    #[test]
    fn preferred_prefix_is_used() {
        let mut preferred = BTreeMap::new();
        preferred.insert("urn:farm".to_string(), "f".to_string());
        let mut table = NamespaceTable::new(preferred);
        table.push_scope();

        assert_eq!(table.prefix_for("urn:farm"), ("f".to_string(), true));
        assert_eq!(table.used().get("urn:farm").map(String::as_str), Some("f"));
    }
}
