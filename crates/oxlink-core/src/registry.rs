//! Two-tier lookup tables: plugin overrides first, then built-ins

use std::collections::BTreeMap;

/// Ordered map pair searched plugin tier first
#[derive(Debug, Clone)]
pub struct TwoTierRegistry<K: Ord, V> {
    plugins: BTreeMap<K, V>,
    builtins: BTreeMap<K, V>,
}

impl<K: Ord, V> TwoTierRegistry<K, V> {
    pub fn with_builtins(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            plugins: BTreeMap::new(),
            builtins: entries.into_iter().collect(),
        }
    }

    /// Replace the plugin tier. An empty list clears every override.
    pub fn set_plugins(&mut self, entries: impl IntoIterator<Item = (K, V)>) {
        self.plugins = entries.into_iter().collect();
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.plugins.get(key).or_else(|| self.builtins.get(key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// All visible entries; a plugin hides the built-in with the same key
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.plugins.values().chain(
            self.builtins
                .iter()
                .filter(|(k, _)| !self.plugins.contains_key(k))
                .map(|(_, v)| v),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_overrides_builtin() {
        let mut reg = TwoTierRegistry::with_builtins([(1, "builtin-one"), (2, "builtin-two")]);
        assert_eq!(reg.get(&1), Some(&"builtin-one"));

        reg.set_plugins([(1, "plugin-one"), (3, "plugin-three")]);
        assert_eq!(reg.get(&1), Some(&"plugin-one"));
        assert_eq!(reg.get(&2), Some(&"builtin-two"));
        assert_eq!(reg.get(&3), Some(&"plugin-three"));
        assert_eq!(reg.values().count(), 3);

        reg.set_plugins([]);
        assert_eq!(reg.get(&1), Some(&"builtin-one"));
        assert!(!reg.contains(&3));
    }
}
