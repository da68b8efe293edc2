//! Set arithmetic over keyed collections.

use std::collections::BTreeMap;

/// How two keyed collections differ. Every part is sorted by key.
pub(crate) struct KeyedDiff<'a, K, L, R = L> {
    pub removed: Vec<(&'a K, &'a L)>,
    pub added: Vec<(&'a K, &'a R)>,
    pub common: Vec<(&'a K, &'a L, &'a R)>,
}

pub(crate) fn diff_keyed<'a, K: Ord, L, R>(
    lhs: &'a BTreeMap<K, L>,
    rhs: &'a BTreeMap<K, R>,
) -> KeyedDiff<'a, K, L, R> {
    let mut diff = KeyedDiff {
        removed: Vec::new(),
        added: Vec::new(),
        common: Vec::new(),
    };

    for (key, l) in lhs {
        match rhs.get(key) {
            Some(r) => diff.common.push((key, l, r)),
            None => diff.removed.push((key, l)),
        }
    }
    for (key, r) in rhs {
        if !lhs.contains_key(key) {
            diff.added.push((key, r));
        }
    }

    diff
}

/// Key a slice of elements. Later elements win over earlier ones with the same key, which is
/// what OpenAPI prescribes for operation parameters overriding path parameters.
pub(crate) fn index_by<K: Ord, T>(
    items: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> K,
) -> BTreeMap<K, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_keys() {
        let lhs: BTreeMap<_, _> = [("a", 1), ("b", 2), ("c", 3)].into();
        let rhs: BTreeMap<_, _> = [("b", 20), ("d", 4), ("c", 3)].into();
        let diff = diff_keyed(&lhs, &rhs);

        assert_eq!(diff.removed, [(&"a", &1)]);
        assert_eq!(diff.added, [(&"d", &4)]);
        assert_eq!(diff.common, [(&"b", &2, &20), (&"c", &3, &3)]);
    }

    #[test]
    fn later_items_win() {
        let indexed = index_by([("id", "path"), ("q", "op"), ("id", "op")], |(name, _)| *name);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed["id"], ("id", "op"));
    }
}
