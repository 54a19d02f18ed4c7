//! Sparse sequences addressed by logical 1-based index
//!
//! Rows within a table, cells within a row and column descriptors are stored sparsely. An
//! element carries an explicit index only when it does not directly follow its predecessor
//! (previous logical index + span + 1), so the stored form stays as compact as the markup.

/// An element of a sparse, ordered sequence.
pub trait Indexed: Default {
    /// Explicit index attribute, if any
    fn index(&self) -> Option<u32>;

    fn set_index(&mut self, index: Option<u32>);

    /// Number of additional logical positions this element occupies
    fn span(&self) -> u32 {
        0
    }

    fn set_span(&mut self, _span: u32) {}
}

/// Result of [`find_by_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Logical index of every element, in storage order
    pub indices: Vec<u32>,
    /// Storage position of the match, or where a new element would be inserted
    pub position: usize,
    pub found: bool,
    /// Storage position of an element whose span covers the requested index
    pub covered_by: Option<usize>,
}

/// Logical index of every element.
///
/// An explicit index that does not move past the running position is ignored, which keeps
/// the result strictly increasing.
pub fn logical_indices<T: Indexed>(items: &[T]) -> Vec<u32> {
    let mut indices = Vec::with_capacity(items.len());
    let mut next = 1u32;
    for item in items {
        let index = match item.index() {
            Some(explicit) if explicit >= next => explicit,
            _ => next,
        };
        indices.push(index);
        next = index.saturating_add(item.span()).saturating_add(1);
    }
    indices
}

/// Last logical position occupied by the sequence, 0 when empty
pub fn last_position<T: Indexed>(items: &[T]) -> u32 {
    match (logical_indices(items).last(), items.last()) {
        (Some(index), Some(item)) => index + item.span(),
        _ => 0,
    }
}

pub fn find_by_index<T: Indexed>(items: &[T], index: u32) -> Lookup {
    let indices = logical_indices(items);
    let position = indices.partition_point(|&i| i < index);
    let found = indices.get(position) == Some(&index);
    let covered_by = if !found && position > 0 {
        let prev = position - 1;
        (indices[prev] + items[prev].span() >= index).then_some(prev)
    } else {
        None
    };

    Lookup {
        indices,
        position,
        found,
        covered_by,
    }
}

/// Rewrite explicit indices so that exactly the elements not following their predecessor
/// carry one. `indices` must be strictly increasing with room for every span.
pub fn normalize<T: Indexed>(items: &mut [T], indices: &[u32]) {
    let mut next = 1u32;
    for (item, &index) in items.iter_mut().zip(indices) {
        item.set_index((index != next).then_some(index));
        next = index + item.span() + 1;
    }
}

/// Storage position of the element at `index`, creating a default one if needed.
///
/// A span that covers `index` is shortened so the new element can take the position.
pub fn create_at_index<T: Indexed>(items: &mut Vec<T>, index: u32) -> usize {
    let lookup = find_by_index(items, index);
    if lookup.found {
        return lookup.position;
    }

    let mut indices = lookup.indices;
    if let Some(covering) = lookup.covered_by {
        items[covering].set_span(index - indices[covering] - 1);
    }
    items.insert(lookup.position, T::default());
    indices.insert(lookup.position, index);
    normalize(items, &indices);
    lookup.position
}

/// Move the element at `position` to the logical `index`, pushing later elements forward
/// where they would collide. Returns the index actually assigned, which is raised past the
/// previous element when `index` would overlap it.
pub fn reindex<T: Indexed>(items: &mut [T], position: usize, index: u32) -> u32 {
    let mut indices = logical_indices(items);
    if position >= indices.len() {
        return index;
    }

    let floor = if position == 0 {
        1
    } else {
        indices[position - 1] + items[position - 1].span() + 1
    };
    indices[position] = index.max(floor);
    for i in position + 1..indices.len() {
        let min = indices[i - 1] + items[i - 1].span() + 1;
        if indices[i] < min {
            indices[i] = min;
        }
    }

    normalize(items, &indices);
    indices[position]
}

/// Delete logical position `index`, shifting everything after it back by one.
///
/// Returns the element stored at exactly that index. A span covering the index shrinks.
pub fn remove_at_index<T: Indexed>(items: &mut Vec<T>, index: u32) -> Option<T> {
    let lookup = find_by_index(items, index);
    let mut indices = lookup.indices;
    let removed = if lookup.found {
        indices.remove(lookup.position);
        Some(items.remove(lookup.position))
    } else {
        if let Some(covering) = lookup.covered_by {
            let span = items[covering].span();
            items[covering].set_span(span - 1);
        }
        None
    };

    for i in indices.iter_mut().skip(lookup.position) {
        *i -= 1;
    }
    normalize(items, &indices);
    removed
}

/// Open an empty logical position at `index`, shifting elements at or after it forward by
/// one. A span covering the index grows.
pub fn insert_at_index<T: Indexed>(items: &mut [T], index: u32) {
    let mut indices = logical_indices(items);
    for (i, logical) in indices.iter_mut().enumerate() {
        if *logical >= index {
            *logical += 1;
        } else if *logical + items[i].span() >= index {
            let span = items[i].span();
            items[i].set_span(span + 1);
        }
    }
    normalize(items, &indices);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Slot {
        index: Option<u32>,
        span: u32,
        tag: &'static str,
    }

    impl Indexed for Slot {
        fn index(&self) -> Option<u32> {
            self.index
        }
        fn set_index(&mut self, index: Option<u32>) {
            self.index = index;
        }
        fn span(&self) -> u32 {
            self.span
        }
        fn set_span(&mut self, span: u32) {
            self.span = span;
        }
    }

    fn slot(index: Option<u32>, span: u32, tag: &'static str) -> Slot {
        Slot { index, span, tag }
    }

    #[test]
    fn test_logical_indices_with_spans() {
        let items = vec![slot(None, 0, "a"), slot(Some(4), 2, "b"), slot(None, 0, "c")];
        assert_eq!(logical_indices(&items), vec![1, 4, 7]);
        assert_eq!(last_position(&items), 7);
    }

    #[test]
    fn test_find_covered() {
        let items = vec![slot(Some(2), 2, "a")];
        let lookup = find_by_index(&items, 3);
        assert!(!lookup.found);
        assert_eq!(lookup.covered_by, Some(0));
        assert_eq!(lookup.position, 1);

        let lookup = find_by_index(&items, 5);
        assert_eq!(lookup.covered_by, None);
    }

    #[test]
    fn test_create_keeps_compact_form() {
        let mut items: Vec<Slot> = Vec::new();
        assert_eq!(create_at_index(&mut items, 3), 0);
        assert_eq!(items[0].index, Some(3));

        assert_eq!(create_at_index(&mut items, 4), 1);
        assert_eq!(items[1].index, None);

        // Filling the gap makes the later explicit index redundant
        create_at_index(&mut items, 1);
        create_at_index(&mut items, 2);
        assert!(items.iter().all(|s| s.index.is_none()));
        assert_eq!(logical_indices(&items), vec![1, 2, 3, 4]);

        // Existing element is returned, not duplicated
        assert_eq!(create_at_index(&mut items, 2), 1);
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_create_inside_span_shortens_it() {
        let mut items = vec![slot(None, 3, "a")];
        let position = create_at_index(&mut items, 3);
        assert_eq!(position, 1);
        assert_eq!(items[0].span, 1);
        assert_eq!(logical_indices(&items), vec![1, 3]);
    }

    #[test]
    fn test_reindex_pushes_successors() {
        let mut items = vec![slot(None, 0, "a"), slot(None, 0, "b"), slot(None, 0, "c")];
        assert_eq!(reindex(&mut items, 1, 5), 5);
        assert_eq!(logical_indices(&items), vec![1, 5, 6]);
        assert_eq!(items[1].index, Some(5));
        assert_eq!(items[2].index, None);

        // Moving behind the predecessor is clamped
        assert_eq!(reindex(&mut items, 2, 1), 6);
    }

    #[test]
    fn test_remove_shifts_back() {
        let mut items = vec![slot(None, 0, "a"), slot(Some(3), 0, "b"), slot(Some(9), 0, "c")];
        let removed = remove_at_index(&mut items, 2);
        assert!(removed.is_none());
        assert_eq!(logical_indices(&items), vec![1, 2, 8]);
        assert_eq!(items[1].index, None);

        let removed = remove_at_index(&mut items, 2);
        assert_eq!(removed.map(|s| s.tag), Some("b"));
        assert_eq!(logical_indices(&items), vec![1, 7]);
    }

    #[test]
    fn test_remove_inside_span_shrinks_it() {
        let mut items = vec![slot(None, 2, "a"), slot(None, 0, "b")];
        assert!(remove_at_index(&mut items, 2).is_none());
        assert_eq!(items[0].span, 1);
        assert_eq!(logical_indices(&items), vec![1, 3]);
    }

    #[test]
    fn test_insert_shifts_forward_and_grows_span() {
        let mut items = vec![slot(None, 1, "a"), slot(None, 0, "b")];
        insert_at_index(&mut items, 2);
        assert_eq!(items[0].span, 2);
        assert_eq!(logical_indices(&items), vec![1, 4]);

        insert_at_index(&mut items, 1);
        assert_eq!(logical_indices(&items), vec![2, 5]);
        assert_eq!(items[0].index, Some(2));
        assert_eq!(items[1].index, None);
    }
}
