//! Sac de propriétés ordonné.

use indexmap::IndexMap;

/// Table clé → valeur qui conserve l'ordre d'insertion.
///
/// Le sac contient à la fois les champs UPnP connus (`deviceType`, `UDN`,
/// `friendlyName`, ...) et le contenu des éléments non reconnus du document
/// de description. L'ordre d'insertion est l'ordre de sérialisation, ce qui
/// permet de restituer les éléments inconnus là où le document les portait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    entries: IndexMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insère ou remplace la valeur de `key`.
    ///
    /// Un remplacement conserve la position d'origine de la clé.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Insère seulement si la clé est absente.
    ///
    /// C'est la règle du parseur : la première occurrence d'un élément non
    /// reconnu gagne. Retourne `true` si la valeur a été insérée.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value.into());
        true
    }

    /// Retire une clé en préservant l'ordre des autres entrées.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Itère les entrées dans l'ordre d'insertion.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut bag = PropertyBag::new();
        bag.set("deviceType", "a");
        bag.set("friendlyName", "b");
        bag.set("UDN", "c");

        let keys: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["deviceType", "friendlyName", "UDN"]);
    }

    #[test]
    fn test_set_if_absent_first_wins() {
        let mut bag = PropertyBag::new();

        assert!(bag.set_if_absent("friendlyName", "first"));
        assert!(!bag.set_if_absent("friendlyName", "second"));
        assert_eq!(bag.get("friendlyName"), Some("first"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut bag = PropertyBag::new();
        bag.set("a", "1");
        bag.set("b", "2");
        bag.set("a", "3");

        assert_eq!(bag.get("a"), Some("3"));
        let keys: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut bag = PropertyBag::new();
        bag.set("a", "1");
        bag.set("b", "2");
        bag.set("c", "3");

        assert_eq!(bag.remove("b"), Some("2".to_string()));
        let keys: Vec<&str> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
