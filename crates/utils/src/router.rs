use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::{extract_local_part, ForwardTarget};

/// Static mapping from a lower-cased local-part to the address that
/// messages for it are forwarded to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: HashMap<String, String>,
}

impl RoutingTable {
    /// Creates a new [`RoutingTable`] from `(local_part, target)` pairs.
    ///
    /// Keys are lower-cased on insertion so that lookups are
    /// case-insensitive. When two keys collide the entry yielded last by
    /// `entries` wins, so for an unordered source (e.g. a `HashMap`) the
    /// result is unspecified. Configuration loading rejects such keys.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Returns the target mapped to the given local-part, if any.
    pub fn get(&self, local_part: &str) -> Option<&str> {
        self.entries.get(local_part).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves the set of forward targets for an envelope's destinations.
///
/// Each destination is lower-cased and its local-part looked up in the
/// table, falling back to the catch-all address when there is no entry.
/// Destinations matching neither are dropped, an empty catch-all counts
/// as absent. The output keeps the order
/// in which targets were first resolved and never repeats a target.
pub fn resolve_targets(
    destinations: &[String],
    table: &RoutingTable,
    catch_all: Option<&str>,
) -> Vec<ForwardTarget> {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();

    for destination in destinations {
        let destination = destination.to_lowercase();
        let local_part = extract_local_part(&destination);

        let target = match table.get(local_part) {
            Some(target) => target,
            None => match catch_all.filter(|catch_all| !catch_all.is_empty()) {
                Some(catch_all) => {
                    debug!(destination = %destination, "Using catch-all for destination");
                    catch_all
                }
                None => {
                    debug!(destination = %destination, "No route for destination, dropping");
                    continue;
                }
            },
        };

        if seen.insert(target.to_string()) {
            targets.push(target.to_string());
        }
    }

    targets
}

/// Routes envelope destinations to forward targets using a fixed
/// [`RoutingTable`] and an optional catch-all address.
#[derive(Debug, Clone, Default)]
pub struct RecipientRouter {
    table: RoutingTable,
    catch_all: Option<String>,
}

impl RecipientRouter {
    /// Creates a new [`RecipientRouter`], an empty catch-all is
    /// considered absent.
    pub fn new(table: RoutingTable, catch_all: Option<String>) -> Self {
        Self {
            table,
            catch_all: catch_all.filter(|c| !c.is_empty()),
        }
    }

    /// Resolves the deduplicated forward targets for the given destinations.
    pub fn resolve(&self, destinations: &[String]) -> Vec<ForwardTarget> {
        resolve_targets(destinations, &self.table, self.catch_all.as_deref())
    }

    /// Returns a reference to the routing table.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Returns the catch-all address, if one is configured.
    pub fn catch_all(&self) -> Option<&str> {
        self.catch_all.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new([
            ("info", "alice@personal.net"),
            ("sales", "bob@personal.net"),
            ("billing", "alice@personal.net"),
        ])
    }

    fn destinations(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_routing_table_lowercases_keys() {
        let table = RoutingTable::new([("Info", "a@x.com"), ("SALES", "b@x.com")]);

        assert_eq!(table.get("info"), Some("a@x.com"));
        assert_eq!(table.get("sales"), Some("b@x.com"));
        assert_eq!(table.get("Info"), None);
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_resolve_mapped_destinations() {
        let targets = resolve_targets(
            &destinations(&["info@example.com", "sales@example.com"]),
            &table(),
            None,
        );
        assert_eq!(targets, vec!["alice@personal.net", "bob@personal.net"]);
    }

    #[test]
    fn test_resolve_deduplicates_mapped_targets() {
        let targets = resolve_targets(
            &destinations(&["info@example.com", "billing@example.com", "info@other.org"]),
            &table(),
            None,
        );
        assert_eq!(targets, vec!["alice@personal.net"]);
    }

    #[test]
    fn test_resolve_deduplicates_catch_all() {
        let targets = resolve_targets(
            &destinations(&["x@example.com", "y@example.com", "sales@example.com"]),
            &table(),
            Some("ops@personal.net"),
        );
        assert_eq!(targets, vec!["ops@personal.net", "bob@personal.net"]);
    }

    #[test]
    fn test_resolve_catch_all_equal_to_mapped_target() {
        let targets = resolve_targets(
            &destinations(&["info@example.com", "unknown@example.com"]),
            &table(),
            Some("alice@personal.net"),
        );
        assert_eq!(targets, vec!["alice@personal.net"]);
    }

    #[test]
    fn test_resolve_drops_unmatched_without_catch_all() {
        let targets = resolve_targets(
            &destinations(&["nobody@example.com", "sales@example.com", "ghost@example.com"]),
            &table(),
            None,
        );
        assert_eq!(targets, vec!["bob@personal.net"]);
    }

    #[test]
    fn test_resolve_empty_when_nothing_matches() {
        let targets = resolve_targets(
            &destinations(&["nobody@example.com", "ghost@example.com"]),
            &table(),
            None,
        );
        assert!(targets.is_empty());

        assert!(resolve_targets(&[], &table(), Some("ops@personal.net")).is_empty());
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let upper = resolve_targets(&destinations(&["Foo@Example.com"]), &table(), Some("c@x.com"));
        let lower = resolve_targets(&destinations(&["foo@example.com"]), &table(), Some("c@x.com"));
        assert_eq!(upper, lower);

        let targets = resolve_targets(&destinations(&["INFO@EXAMPLE.COM"]), &table(), None);
        assert_eq!(targets, vec!["alice@personal.net"]);
    }

    #[test]
    fn test_resolve_without_at_sign() {
        let targets = resolve_targets(&destinations(&["Sales"]), &table(), None);
        assert_eq!(targets, vec!["bob@personal.net"]);
    }

    #[test]
    fn test_resolve_order_follows_first_resolution() {
        let targets = resolve_targets(
            &destinations(&["sales@a.com", "info@a.com", "sales@b.com", "billing@a.com"]),
            &table(),
            None,
        );
        assert_eq!(targets, vec!["bob@personal.net", "alice@personal.net"]);
    }

    #[test]
    fn test_resolve_empty_catch_all_is_absent() {
        let targets = resolve_targets(
            &destinations(&["unknown@example.com", "sales@example.com"]),
            &table(),
            Some(""),
        );
        assert_eq!(targets, vec!["bob@personal.net"]);
    }

    #[test]
    fn test_router_empty_catch_all_is_absent() {
        let router = RecipientRouter::new(table(), Some(String::new()));
        assert!(router.catch_all().is_none());
        assert!(router
            .resolve(&destinations(&["unknown@example.com"]))
            .is_empty());
    }

    #[test]
    fn test_router_resolve() {
        let router = RecipientRouter::new(table(), Some("ops@personal.net".to_string()));

        assert_eq!(router.table().len(), 3);
        assert_eq!(router.catch_all(), Some("ops@personal.net"));
        assert_eq!(
            router.resolve(&destinations(&["info@example.com", "random@example.com"])),
            vec!["alice@personal.net", "ops@personal.net"]
        );
    }
}
