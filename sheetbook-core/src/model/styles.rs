//! Workbook style registry with content-based deduplication

use super::style::{Style, StyleId, StyleSpec};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ordered collection of styles, unique by ID.
///
/// The `Default` style is always present at position 0. A content cache maps a
/// [`StyleSpec`] to the ID of the first style with that content; every mutation of a
/// style's content removes the entries that point at it.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    styles: Vec<Style>,
    by_id: HashMap<StyleId, usize>,
    by_content: HashMap<StyleSpec, StyleId>,
    max_serial: u32,
    prefix: String,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::with_prefix("s")
    }
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry generating IDs of the form `{prefix}{n}`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let default = Style::new(StyleId::default_id(), StyleSpec::default());
        let mut by_id = HashMap::new();
        by_id.insert(default.id.clone(), 0);
        Self {
            styles: vec![default],
            by_id,
            by_content: HashMap::new(),
            max_serial: 0,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Never true: the `Default` style cannot be removed
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Style> {
        self.styles.iter()
    }

    pub fn contains(&self, id: &StyleId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &StyleId) -> Option<&Style> {
        self.by_id.get(id).map(|&i| &self.styles[i])
    }

    pub fn default_style(&self) -> &Style {
        &self.styles[0]
    }

    /// The referenced style, falling back to `Default` for missing or dangling references
    pub fn resolve(&self, id: Option<&StyleId>) -> &Style {
        match id {
            Some(id) => self.get(id).unwrap_or_else(|| {
                debug!(style = %id, "dangling style reference resolved to Default");
                self.default_style()
            }),
            None => self.default_style(),
        }
    }

    /// Content of a style with its parent chain folded in, nearest ancestor winning
    pub fn effective_spec(&self, id: Option<&StyleId>) -> StyleSpec {
        let mut chain = Vec::new();
        let mut current = Some(self.resolve(id));
        while let Some(style) = current {
            if chain.iter().any(|s: &&Style| s.id == style.id) {
                break;
            }
            chain.push(style);
            current = style.parent.as_ref().and_then(|parent| self.get(parent));
        }
        chain
            .iter()
            .rev()
            .fold(StyleSpec::default(), |spec, style| spec.merged(&style.spec))
    }

    /// Allocate a fresh, empty style with the next free generated ID
    pub fn create_style(&mut self) -> StyleId {
        let mut serial = self.max_serial + 1;
        let mut id = StyleId::new(format!("{}{}", self.prefix, serial));
        while self.by_id.contains_key(&id) {
            serial += 1;
            id = StyleId::new(format!("{}{}", self.prefix, serial));
        }
        self.max_serial = serial;
        self.by_id.insert(id.clone(), self.styles.len());
        self.styles.push(Style::new(id.clone(), StyleSpec::default()));
        id
    }

    /// Add a style read from a document; a style with the same ID has its content replaced.
    pub fn insert(&mut self, style: Style) -> StyleId {
        let id = style.id.clone();
        if let Some(serial) = id.serial(&self.prefix) {
            self.max_serial = self.max_serial.max(serial);
        }
        match self.by_id.get(&id).copied() {
            Some(i) => {
                self.invalidate(&id);
                self.styles[i] = style;
            }
            None => {
                self.by_id.insert(id.clone(), self.styles.len());
                self.styles.push(style);
            }
        }
        id
    }

    /// ID of the first style in registry order whose effective content equals `spec`.
    /// A style inheriting sub-elements `spec` lacks does not match.
    pub fn find_style(&mut self, spec: &StyleSpec) -> Option<StyleId> {
        if let Some(id) = self.by_content.get(spec) {
            return Some(id.clone());
        }
        let id = self
            .styles
            .iter()
            .find(|style| self.effective_spec(Some(&style.id)) == *spec)
            .map(|style| style.id.clone())?;
        self.by_content.insert(spec.clone(), id.clone());
        Some(id)
    }

    /// Existing style with this content, or a new one holding it
    pub fn get_or_create(&mut self, spec: StyleSpec) -> StyleId {
        if let Some(id) = self.find_style(&spec) {
            return id;
        }
        let id = self.create_style();
        self.set_attrs(&id, spec);
        id
    }

    /// Replace the whole content of a style. Returns false for an unknown ID.
    pub fn set_attrs(&mut self, id: &StyleId, spec: StyleSpec) -> bool {
        let Some(&i) = self.by_id.get(id) else {
            return false;
        };
        self.invalidate(id);
        self.styles[i].spec = spec;
        true
    }

    /// Overlay the sub-elements present in `spec` onto a style's content
    pub fn update_attrs(&mut self, id: &StyleId, spec: &StyleSpec) -> bool {
        let Some(&i) = self.by_id.get(id) else {
            return false;
        };
        self.invalidate(id);
        self.styles[i].spec = self.styles[i].spec.merged(spec);
        true
    }

    pub fn set_parent(&mut self, id: &StyleId, parent: Option<StyleId>) -> bool {
        let Some(&i) = self.by_id.get(id) else {
            return false;
        };
        self.invalidate(id);
        self.styles[i].parent = parent;
        true
    }

    /// Remove a style; `Default` cannot be removed
    pub fn remove(&mut self, id: &StyleId) -> Option<Style> {
        if id.is_default() {
            return None;
        }
        let i = self.by_id.remove(id)?;
        self.invalidate(id);
        let style = self.styles.remove(i);
        for position in self.by_id.values_mut() {
            if *position > i {
                *position -= 1;
            }
        }
        Some(style)
    }

    /// Drop every style not in `used`, keeping `Default` and all ancestors of kept styles.
    /// Returns the removed IDs in registry order.
    pub fn clear_unused(&mut self, used: &HashSet<StyleId>) -> Vec<StyleId> {
        let mut keep: HashSet<StyleId> = HashSet::new();
        keep.insert(StyleId::default_id());
        for id in used {
            let mut current = self.get(id).map(|style| style.id.clone());
            while let Some(id) = current {
                if !keep.insert(id.clone()) {
                    break;
                }
                current = self.get(&id).and_then(|style| style.parent.clone());
            }
        }

        let removed: Vec<StyleId> = self
            .styles
            .iter()
            .filter(|style| !keep.contains(&style.id))
            .map(|style| style.id.clone())
            .collect();
        if removed.is_empty() {
            return removed;
        }

        self.styles.retain(|style| keep.contains(&style.id));
        self.by_id = self
            .styles
            .iter()
            .enumerate()
            .map(|(i, style)| (style.id.clone(), i))
            .collect();
        self.by_content.clear();
        debug!(count = removed.len(), "removed unused styles");
        removed
    }

    /// Drop cache entries for `id` and for every style inheriting from it
    fn invalidate(&mut self, id: &StyleId) {
        let stale: HashSet<StyleId> = self
            .by_content
            .values()
            .filter(|cached| self.inherits_from(cached, id))
            .cloned()
            .collect();
        self.by_content.retain(|_, cached| !stale.contains(cached));
    }

    /// Whether `ancestor` is `id` or on its parent chain
    fn inherits_from(&self, id: &StyleId, ancestor: &StyleId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.get(id).and_then(|style| style.parent.as_ref());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::style::{Font, Interior, Color};

    fn bold() -> StyleSpec {
        StyleSpec::new().with_font(Font {
            bold: true,
            ..Font::default()
        })
    }

    #[test]
    fn test_default_always_present() {
        let registry = StyleRegistry::new();
        assert_eq!(registry.len(), 1);
        assert!(registry.default_style().id.is_default());
        assert!(registry.resolve(Some(&StyleId::new("missing"))).id.is_default());
    }

    #[test]
    fn test_generated_ids_skip_taken() {
        let mut registry = StyleRegistry::new();
        registry.insert(Style::new(StyleId::new("s2"), StyleSpec::default()));
        assert_eq!(registry.create_style().as_str(), "s3");
        registry.insert(Style::new(StyleId::new("s10"), StyleSpec::default()));
        assert_eq!(registry.create_style().as_str(), "s11");
    }

    #[test]
    fn test_get_or_create_dedupes() {
        let mut registry = StyleRegistry::new();
        let first = registry.get_or_create(bold());
        let second = registry.get_or_create(bold());
        assert_eq!(first, second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cache_invalidated_on_change() {
        let mut registry = StyleRegistry::new();
        let id = registry.get_or_create(bold());
        assert_eq!(registry.find_style(&bold()), Some(id.clone()));

        let red = StyleSpec::new().with_interior(Interior::solid(Color::parse("#FF0000").unwrap()));
        assert!(registry.set_attrs(&id, red.clone()));
        assert_eq!(registry.find_style(&bold()), None);
        assert_eq!(registry.find_style(&red), Some(id.clone()));

        assert!(registry.update_attrs(&id, &bold()));
        let style = registry.get(&id).unwrap();
        assert!(style.spec.interior.is_some());
        assert!(style.spec.font.as_ref().is_some_and(|f| f.bold));
    }

    #[test]
    fn test_inherited_content_does_not_match() {
        let mut registry = StyleRegistry::new();
        registry.insert(Style::new(StyleId::new("s1"), bold()));
        let mut child = Style::new(StyleId::new("s2"), StyleSpec::new().with_number_format("0%"));
        child.parent = Some(StyleId::new("s1"));
        registry.insert(child);

        let percent = StyleSpec::new().with_number_format("0%");
        let id = registry.get_or_create(percent.clone());
        assert_ne!(id, StyleId::new("s2"));
        assert_eq!(registry.effective_spec(Some(&id)), percent);

        // The full inherited content still finds the child
        let inherited = bold().with_number_format("0%");
        assert_eq!(registry.find_style(&inherited), Some(StyleId::new("s2")));
    }

    #[test]
    fn test_parent_change_invalidates_cache() {
        let mut registry = StyleRegistry::new();
        let parent = registry.get_or_create(bold());
        let child = registry.get_or_create(StyleSpec::new().with_number_format("0.0"));
        let plain = StyleSpec::new().with_number_format("0.0");
        assert_eq!(registry.find_style(&plain), Some(child.clone()));

        registry.set_parent(&child, Some(parent.clone()));
        assert_eq!(registry.find_style(&plain), None);
        assert_eq!(
            registry.find_style(&bold().with_number_format("0.0")),
            Some(child.clone())
        );

        // Editing the parent drops the child's cached entry too
        registry.set_attrs(&parent, StyleSpec::default());
        assert_eq!(registry.find_style(&bold().with_number_format("0.0")), None);
        assert_eq!(registry.find_style(&plain), Some(child));
    }

    #[test]
    fn test_find_returns_first_in_registry_order() {
        let mut registry = StyleRegistry::new();
        registry.insert(Style::new(StyleId::new("a"), bold()));
        registry.insert(Style::new(StyleId::new("b"), bold()));
        assert_eq!(registry.find_style(&bold()), Some(StyleId::new("a")));
    }

    #[test]
    fn test_clear_unused_keeps_parents_and_is_idempotent() {
        let mut registry = StyleRegistry::new();
        let parent = registry.get_or_create(bold());
        let child = registry.create_style();
        registry.set_parent(&child, Some(parent.clone()));
        let orphan = registry.get_or_create(StyleSpec::new().with_number_format("0.00"));

        let used: HashSet<StyleId> = [child.clone()].into_iter().collect();
        let removed = registry.clear_unused(&used);
        assert_eq!(removed, vec![orphan.clone()]);
        assert!(registry.contains(&parent));
        assert!(registry.contains(&child));
        assert!(registry.contains(&StyleId::default_id()));

        assert!(registry.clear_unused(&used).is_empty());
        assert_eq!(registry.len(), 3);
        assert!(registry.get(&child).is_some());
    }

    #[test]
    fn test_remove_refuses_default() {
        let mut registry = StyleRegistry::new();
        assert!(registry.remove(&StyleId::default_id()).is_none());
        let id = registry.create_style();
        let other = registry.create_style();
        assert!(registry.remove(&id).is_some());
        assert_eq!(registry.get(&other).map(|s| s.id.clone()), Some(other));
    }

    #[test]
    fn test_effective_spec_folds_parents() {
        let mut registry = StyleRegistry::new();
        let parent = registry.get_or_create(bold().with_number_format("0.00"));
        let child = registry.get_or_create(StyleSpec::new().with_number_format("0%"));
        registry.set_parent(&child, Some(parent.clone()));

        let spec = registry.effective_spec(Some(&child));
        assert_eq!(spec.number_format.map(|n| n.format), Some("0%".to_string()));
        assert!(spec.font.is_some_and(|f| f.bold));

        // A parent cycle terminates
        registry.set_parent(&parent, Some(child.clone()));
        assert!(registry.effective_spec(Some(&parent)).font.is_some());
        assert_eq!(registry.effective_spec(None), StyleSpec::default());
    }
}
