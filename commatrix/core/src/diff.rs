//! Reconciliation of two communication matrices.

use crate::{ComDetail, ComMatrix};
use ahash::AHashSet;

/// Determines which row fields identify a row when comparing matrices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DiffKey {
    /// `(nodeRole, port, protocol)`, the same key used for deduplication.
    #[default]
    Composite,

    /// Only the port; role and protocol are ignored.
    Port,
}

/// The result of comparing two matrices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diff {
    /// Rows whose key appears in the first matrix but not the second.
    pub only_in_first: ComMatrix,

    /// Rows whose key appears in the second matrix but not the first.
    pub only_in_second: ComMatrix,
}

/// Computes both set differences between `first` and `second`.
///
/// Neither input is modified; the returned rows keep the order in which they appear in their
/// source matrix.
pub fn diff(first: &ComMatrix, second: &ComMatrix, key: DiffKey) -> Diff {
    Diff {
        only_in_first: first.difference(second, key),
        only_in_second: second.difference(first, key),
    }
}

// === impl DiffKey ===

impl DiffKey {
    pub fn of(&self, row: &ComDetail) -> String {
        match self {
            Self::Composite => row.key(),
            Self::Port => row.port.clone(),
        }
    }
}

// === impl Diff ===

impl Diff {
    /// Two matrices are considered equal when neither has rows the other lacks.
    pub fn is_empty(&self) -> bool {
        self.only_in_first.is_empty() && self.only_in_second.is_empty()
    }
}

// === impl ComMatrix ===

impl ComMatrix {
    /// Returns the rows of `self` whose key does not appear in `other`.
    pub fn difference(&self, other: &ComMatrix, key: DiffKey) -> ComMatrix {
        let keys = other.iter().map(|row| key.of(row)).collect::<AHashSet<_>>();
        self.iter()
            .filter(|row| !keys.contains(&key.of(row)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, Arbitrary, Gen};

    impl Arbitrary for DiffKey {
        fn arbitrary(g: &mut Gen) -> Self {
            *g.choose(&[Self::Composite, Self::Port]).unwrap()
        }
    }

    fn keys(m: &ComMatrix, key: DiffKey) -> AHashSet<String> {
        m.iter().map(|row| key.of(row)).collect()
    }

    fn mk_matrix(rows: &[(&str, &str, &str)]) -> ComMatrix {
        rows.iter()
            .map(|(role, port, proto)| ComDetail::ingress(proto, port, role, "svc", true))
            .collect()
    }

    #[test]
    fn diff_with_self_is_empty() {
        let a = mk_matrix(&[("worker", "22", "TCP"), ("master", "6443", "TCP")]);
        assert!(diff(&a, &a, DiffKey::Composite).is_empty());
        assert!(diff(&a, &a, DiffKey::Port).is_empty());
        assert!(diff(&ComMatrix::default(), &ComMatrix::default(), DiffKey::Composite).is_empty());
    }

    #[test]
    fn diff_reports_both_directions() {
        let inferred = mk_matrix(&[
            ("worker", "22", "TCP"),
            ("master", "6443", "TCP"),
            ("worker", "111", "UDP"),
        ]);
        let observed = mk_matrix(&[
            ("worker", "22", "TCP"),
            ("worker", "111", "TCP"),
            ("worker", "9100", "TCP"),
        ]);

        let d = diff(&inferred, &observed, DiffKey::Composite);
        assert_eq!(
            d.only_in_first,
            mk_matrix(&[("master", "6443", "TCP"), ("worker", "111", "UDP")])
        );
        assert_eq!(
            d.only_in_second,
            mk_matrix(&[("worker", "111", "TCP"), ("worker", "9100", "TCP")])
        );
        assert!(!d.is_empty());
    }

    #[test]
    fn diff_ignores_service_name_and_required() {
        let a = ComMatrix::new(vec![ComDetail::ingress("TCP", "22", "worker", "sshd", false)]);
        let b = ComMatrix::new(vec![ComDetail::ingress("TCP", "22", "worker", "other", true)]);
        assert!(diff(&a, &b, DiffKey::Composite).is_empty());
    }

    #[test]
    fn diff_is_symmetric_over_same_keys() {
        let a = mk_matrix(&[("worker", "22", "TCP"), ("master", "22", "TCP")]);
        let b = mk_matrix(&[("master", "22", "TCP"), ("worker", "22", "TCP")]);
        assert!(diff(&a, &b, DiffKey::Composite).is_empty());
        assert!(diff(&b, &a, DiffKey::Composite).is_empty());
    }

    #[test]
    fn port_key_ignores_role_and_protocol() {
        let a = mk_matrix(&[("worker", "22", "TCP"), ("master", "53", "UDP")]);
        let b = mk_matrix(&[("master", "22", "TCP"), ("worker", "53", "TCP")]);
        assert!(!diff(&a, &b, DiffKey::Composite).is_empty());
        assert!(diff(&a, &b, DiffKey::Port).is_empty());
    }

    #[test]
    fn difference_leaves_inputs_untouched() {
        let a = mk_matrix(&[("worker", "22", "TCP"), ("worker", "80", "TCP")]);
        let b = mk_matrix(&[("worker", "80", "TCP")]);
        let before = a.clone();
        let only_a = a.difference(&b, DiffKey::Composite);
        assert_eq!(only_a, mk_matrix(&[("worker", "22", "TCP")]));
        assert_eq!(a, before);
    }

    quickcheck! {
        fn diff_of_matrix_with_itself_is_empty(rows: Vec<ComDetail>, key: DiffKey) -> bool {
            let m = ComMatrix::new(rows);
            diff(&m, &m, key).is_empty()
        }

        fn diff_is_empty_iff_keys_match(
            a: Vec<ComDetail>,
            b: Vec<ComDetail>,
            key: DiffKey
        ) -> bool {
            let (a, b) = (ComMatrix::new(a), ComMatrix::new(b));
            let same = keys(&a, key) == keys(&b, key);
            diff(&a, &b, key).is_empty() == same && diff(&b, &a, key).is_empty() == same
        }

        fn diff_ignores_row_order(rows: Vec<ComDetail>, key: DiffKey) -> bool {
            let a = ComMatrix::new(rows.clone());
            let b = ComMatrix::new(rows.into_iter().rev());
            diff(&a, &b, key).is_empty()
        }

        fn difference_holds_only_missing_keys(
            a: Vec<ComDetail>,
            b: Vec<ComDetail>,
            key: DiffKey
        ) -> bool {
            let (a, b) = (ComMatrix::new(a), ComMatrix::new(b));
            let missing = a.difference(&b, key);
            let b_keys = keys(&b, key);
            let expected = a.iter().filter(|row| !b_keys.contains(&key.of(row))).count();
            missing.len() == expected && missing.iter().all(|row| !b_keys.contains(&key.of(row)))
        }
    }
}
