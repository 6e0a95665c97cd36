//! Canonical CIDR sets and set algebra
//!
//! Every diff in the synchronizer is computed over [`CidrSet`] values: an
//! unordered, deduplicated set of IPv4 networks. Entry order returned by any
//! upstream or downstream API never influences a diff.
//!
//! Parsing is strict: a CIDR whose address has host bits set (for example
//! `10.0.0.1/24`) is rejected as an input error rather than silently
//! normalized, so a typo in configuration or a malformed upstream payload
//! fails loudly instead of authorizing the wrong network.

use std::collections::BTreeSet;
use std::fmt;

use ipnetwork::Ipv4Network;

use crate::error::{Error, Result};

/// Parse a single CIDR, rejecting host bits
///
/// Accepts surrounding whitespace. Fails with [`Error::Cidr`] on syntax
/// errors, invalid prefix lengths, and addresses that are not the network
/// address of their block.
pub fn parse_cidr(input: &str) -> Result<Ipv4Network> {
    let trimmed = input.trim();
    let net: Ipv4Network = trimmed
        .parse()
        .map_err(|e| Error::cidr(format!("{trimmed}: {e}")))?;

    if net.ip() != net.network() {
        return Err(Error::cidr(format!(
            "{trimmed}: host bits set (expected {}/{})",
            net.network(),
            net.prefix()
        )));
    }

    Ok(net)
}

/// An unordered, deduplicated set of IPv4 CIDR blocks
///
/// Backed by a `BTreeSet` so iteration is in canonical address order, which
/// keeps log output and API request bodies stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CidrSet(BTreeSet<Ipv4Network>);

impl CidrSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a collection of CIDR strings into a set
    ///
    /// Any single invalid entry fails the whole parse; partial sets are
    /// never produced.
    pub fn parse<I, S>(cidrs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        cidrs
            .into_iter()
            .map(|s| parse_cidr(s.as_ref()))
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Insert a network, returning whether it was newly added
    pub fn insert(&mut self, net: Ipv4Network) -> bool {
        self.0.insert(net)
    }

    /// Whether the set contains the given network
    pub fn contains(&self, net: &Ipv4Network) -> bool {
        self.0.contains(net)
    }

    /// Number of blocks in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the blocks in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &Ipv4Network> {
        self.0.iter()
    }

    /// Set union `self ∪ other`
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Set difference `self − other`
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).copied().collect())
    }

    /// Set intersection `self ∩ other`
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }
}

impl FromIterator<Ipv4Network> for CidrSet {
    fn from_iter<I: IntoIterator<Item = Ipv4Network>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CidrSet {
    type Item = &'a Ipv4Network;
    type IntoIter = std::collections::btree_set::Iter<'a, Ipv4Network>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for CidrSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, net) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{net}")?;
        }
        write!(f, "]")
    }
}

/// The add/remove delta between a target's live CIDRs and a desired set
///
/// Ephemeral by design: always recomputed from the target's freshly-read
/// state immediately before mutating, never stored and never derived from an
/// upstream snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    /// Blocks present in the desired set but missing from the target
    pub to_add: CidrSet,
    /// Blocks present on the target but absent from the desired set
    pub to_remove: CidrSet,
}

impl Diff {
    /// Compute `{desired − current, current − desired}`
    pub fn between(current: &CidrSet, desired: &CidrSet) -> Self {
        Self {
            to_add: desired.difference(current),
            to_remove: current.difference(desired),
        }
    }

    /// Whether applying this diff would be a no-op
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cidrs: &[&str]) -> CidrSet {
        CidrSet::parse(cidrs).unwrap()
    }

    #[test]
    fn parse_accepts_canonical_blocks() {
        let net = parse_cidr("10.0.0.0/24").unwrap();
        assert_eq!(net.prefix(), 24);
        assert_eq!(net.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn parse_rejects_host_bits() {
        let err = parse_cidr("10.0.0.1/24").unwrap_err();
        assert!(matches!(err, Error::Cidr(_)), "got {err:?}");
        assert!(err.to_string().contains("host bits"));
    }

    #[test]
    fn parse_rejects_garbage_and_bad_prefix() {
        assert!(parse_cidr("not-a-cidr").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("").is_err());
    }

    #[test]
    fn parse_trims_whitespace() {
        assert!(parse_cidr("  192.0.2.0/24 ").is_ok());
    }

    #[test]
    fn one_bad_entry_fails_the_whole_set() {
        let err = CidrSet::parse(["10.0.0.0/24", "10.0.1.5/24"]).unwrap_err();
        assert!(matches!(err, Error::Cidr(_)));
    }

    #[test]
    fn sets_are_deduplicated_and_order_insensitive() {
        let a = set(&["10.0.1.0/24", "10.0.0.0/24", "10.0.1.0/24"]);
        let b = set(&["10.0.0.0/24", "10.0.1.0/24"]);
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn difference_of_a_set_with_itself_is_empty() {
        let a = set(&["10.0.0.0/24", "192.0.2.0/28"]);
        assert!(a.difference(&a).is_empty());
    }

    #[test]
    fn diff_union_consistency_reconstructs_the_union() {
        // difference(A,B) ∪ difference(B,A) ∪ (A∩B) == A ∪ B
        let a = set(&["10.0.0.0/24", "10.0.1.0/24", "172.16.0.0/16"]);
        let b = set(&["10.0.1.0/24", "192.0.2.0/24"]);

        let reconstructed = a
            .difference(&b)
            .union(&b.difference(&a))
            .union(&a.intersection(&b));
        assert_eq!(reconstructed, a.union(&b));
    }

    #[test]
    fn diff_between_computes_both_directions() {
        let current = set(&["10.0.0.0/24", "10.0.2.0/24"]);
        let desired = set(&["10.0.0.0/24", "10.0.1.0/24"]);

        let diff = Diff::between(&current, &desired);
        assert_eq!(diff.to_add, set(&["10.0.1.0/24"]));
        assert_eq!(diff.to_remove, set(&["10.0.2.0/24"]));
        assert!(!diff.is_empty());
    }

    #[test]
    fn diff_between_identical_sets_is_empty() {
        let current = set(&["10.0.0.0/24"]);
        let diff = Diff::between(&current, &current.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn display_lists_blocks_in_address_order() {
        let a = set(&["192.0.2.0/24", "10.0.0.0/8"]);
        assert_eq!(a.to_string(), "[10.0.0.0/8, 192.0.2.0/24]");
    }
}
