//! Hostname change batcher
//!
//! Turns a current and a desired hostname map into an ordered list of
//! [`BatchRequest`]s that, applied in order, make current equal desired.
//!
//! ## Ordering
//!
//! ```text
//! priority tier  : removals of hostnames whose mapping changed
//! regular tier   : all adds (cname order), then plain removals (cname order)
//! ```
//!
//! A cname cannot carry two mappings at once, so changed entries are
//! retired in batches of their own before any regular batch. Within the
//! regular tier, adds go first so shared edge targets keep serving traffic.
//!
//! Everything here is pure: no I/O, no errors, and the output depends only
//! on the content of the two maps.

use crate::model::{BatchMetadata, BatchRequest, HostnameMap, Operation};

/// Maximum number of operations the upstream accepts in one PATCH
pub const HOSTNAME_LIMIT: usize = 1000;

/// Split the difference between `current` and `desired` into two tiers
///
/// Returns `(priority_ops, ops)`. Neither list is sorted.
pub fn compute_operations(
    current: &HostnameMap,
    desired: &HostnameMap,
) -> (Vec<Operation>, Vec<Operation>) {
    let mut priority_ops = Vec::new();
    let mut ops = Vec::new();

    for (cname_from, wanted) in desired {
        match current.get(cname_from) {
            None => ops.push(Operation::add(cname_from, wanted)),
            Some(existing) if !existing.content_eq(wanted) => {
                priority_ops.push(Operation::remove(cname_from, existing));
                ops.push(Operation::add(cname_from, wanted));
            }
            Some(_) => {}
        }
    }

    for (cname_from, existing) in current {
        if !desired.contains_key(cname_from) {
            ops.push(Operation::remove(cname_from, existing));
        }
    }

    (priority_ops, ops)
}

/// Order operations: adds before removes, each group by cname-from
pub fn sort_operations(mut ops: Vec<Operation>) -> Vec<Operation> {
    ops.sort_by(|a, b| a.cname_from.cmp(&b.cname_from));
    ops.sort_by_key(|op| op.action);
    ops
}

/// Chunk sorted operations into batches of at most `limit`
///
/// A `limit` of 0 is treated as 1.
pub fn build_batches(
    ops: &[Operation],
    limit: usize,
    metadata: &BatchMetadata,
) -> Vec<BatchRequest> {
    ops.chunks(limit.max(1))
        .map(|chunk| {
            let mut batch = BatchRequest::new(metadata);
            for op in chunk {
                batch.push(op);
            }
            batch
        })
        .collect()
}

/// Compute every batch needed to move from `current` to `desired`
pub fn build(
    current: &HostnameMap,
    desired: &HostnameMap,
    limit: usize,
    metadata: &BatchMetadata,
) -> Vec<BatchRequest> {
    let (priority_ops, ops) = compute_operations(current, desired);

    let mut batches = build_batches(&sort_operations(priority_ops), limit, metadata);
    batches.extend(build_batches(&sort_operations(ops), limit, metadata));
    batches
}

/// The batches for one run plus the state they were computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Hostnames attached upstream when the plan was made
    pub current: HostnameMap,
    /// Batches in apply order
    pub batches: Vec<BatchRequest>,
}

impl Plan {
    pub fn new(current: HostnameMap, batches: Vec<BatchRequest>) -> Self {
        Self { current, batches }
    }

    /// Nothing to change
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn add_count(&self) -> usize {
        self.batches.iter().map(|b| b.add.len()).sum()
    }

    pub fn remove_count(&self) -> usize {
        self.batches.iter().map(|b| b.remove.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, CertProvisioningType, HostnameRecord, Network};
    use std::collections::HashSet;

    fn metadata() -> BatchMetadata {
        BatchMetadata {
            network: Network::Staging,
            note: Some("hostname sync".to_string()),
            notify_emails: vec!["ops@example.com".to_string()],
        }
    }

    fn record(cert: CertProvisioningType, ehn: u32) -> HostnameRecord {
        HostnameRecord::new(cert, &format!("ehn_{ehn}"))
    }

    /// `count` hostnames named `www{i}.example.com`, all with the same cert type
    fn hostnames(count: usize, cert: CertProvisioningType) -> HostnameMap {
        (0..count)
            .map(|i| (format!("www{i}.example.com"), record(cert, 100)))
            .collect()
    }

    /// (adds, removes) per batch
    fn shape(batches: &[BatchRequest]) -> Vec<(usize, usize)> {
        batches.iter().map(|b| (b.add.len(), b.remove.len())).collect()
    }

    #[test]
    fn empty_states_produce_no_batches() {
        let batches = build(&HostnameMap::new(), &HostnameMap::new(), HOSTNAME_LIMIT, &metadata());
        assert!(batches.is_empty());
    }

    #[test]
    fn identical_states_produce_no_batches() {
        let state = hostnames(1500, CertProvisioningType::Default);
        let batches = build(&state, &state, HOSTNAME_LIMIT, &metadata());
        assert!(batches.is_empty());
    }

    #[test]
    fn cname_to_difference_alone_is_not_a_change() {
        let mut current = HostnameMap::new();
        current.insert(
            "www.example.com".to_string(),
            record(CertProvisioningType::CpsManaged, 1).with_cname_to("www.example.com.edgekey.net"),
        );
        let mut desired = HostnameMap::new();
        desired.insert(
            "www.example.com".to_string(),
            HostnameRecord::new(CertProvisioningType::CpsManaged, "1"),
        );

        assert!(build(&current, &desired, HOSTNAME_LIMIT, &metadata()).is_empty());
    }

    #[test]
    fn two_new_hostnames_make_one_add_batch() {
        let desired = hostnames(2, CertProvisioningType::Default);
        let batches = build(&HostnameMap::new(), &desired, HOSTNAME_LIMIT, &metadata());
        assert_eq!(shape(&batches), vec![(2, 0)]);
    }

    #[test]
    fn two_dropped_hostnames_make_one_remove_batch() {
        let current = hostnames(2, CertProvisioningType::Default);
        let batches = build(&current, &HostnameMap::new(), HOSTNAME_LIMIT, &metadata());
        assert_eq!(shape(&batches), vec![(0, 2)]);
    }

    #[test]
    fn exactly_limit_removes_fit_one_batch() {
        let current = hostnames(1000, CertProvisioningType::Default);
        let batches = build(&current, &HostnameMap::new(), HOSTNAME_LIMIT, &metadata());
        assert_eq!(shape(&batches), vec![(0, 1000)]);
    }

    #[test]
    fn limit_plus_one_removes_split_in_two() {
        let current = hostnames(1001, CertProvisioningType::Default);
        let batches = build(&current, &HostnameMap::new(), HOSTNAME_LIMIT, &metadata());
        assert_eq!(shape(&batches), vec![(0, 1000), (0, 1)]);
    }

    #[test]
    fn changed_cert_types_retire_old_mappings_first() {
        // 3000 current hostnames; the first 2000 are kept but switch cert type.
        let current = hostnames(3000, CertProvisioningType::Default);
        let desired: HostnameMap = (0..2000)
            .map(|i| {
                (
                    format!("www{i}.example.com"),
                    record(CertProvisioningType::CpsManaged, 100),
                )
            })
            .collect();

        let batches = build(&current, &desired, HOSTNAME_LIMIT, &metadata());

        assert_eq!(
            shape(&batches),
            vec![(0, 1000), (0, 1000), (1000, 0), (1000, 0), (0, 1000)]
        );

        // The priority removals cover exactly the changed hostnames.
        let retired: HashSet<&String> = batches[..2].iter().flat_map(|b| &b.remove).collect();
        assert_eq!(retired.len(), 2000);
        assert!(retired.iter().all(|cname| desired.contains_key(*cname)));
    }

    #[test]
    fn mixed_changes_fill_batches_before_starting_new_ones() {
        // 700 new hostnames and 600 dropped ones: 1300 regular operations.
        let current: HostnameMap = (0..600)
            .map(|i| (format!("old{i}.example.com"), record(CertProvisioningType::Default, 1)))
            .collect();
        let desired: HostnameMap = (0..700)
            .map(|i| (format!("new{i}.example.com"), record(CertProvisioningType::Default, 1)))
            .collect();

        let batches = build(&current, &desired, HOSTNAME_LIMIT, &metadata());

        assert_eq!(shape(&batches), vec![(700, 300), (0, 300)]);
    }

    #[test]
    fn every_batch_respects_the_limit() {
        let current = hostnames(257, CertProvisioningType::Default);
        let desired: HostnameMap = (100..400)
            .map(|i| (format!("www{i}.example.com"), record(CertProvisioningType::CpsManaged, 7)))
            .collect();

        for limit in [1, 7, 50, 1000] {
            let batches = build(&current, &desired, limit, &metadata());
            assert!(batches.iter().all(|b| b.len() <= limit && !b.is_empty()));
        }
    }

    #[test]
    fn output_covers_every_operation_exactly_once() {
        let mut current = hostnames(40, CertProvisioningType::Default);
        current.insert("legacy.example.com".to_string(), record(CertProvisioningType::Default, 9));
        let mut desired = hostnames(30, CertProvisioningType::Default);
        desired.insert("www5.example.com".to_string(), record(CertProvisioningType::Default, 200));
        desired.insert("fresh.example.com".to_string(), record(CertProvisioningType::CpsManaged, 3));

        let batches = build(&current, &desired, 8, &metadata());

        let added: Vec<&String> = batches.iter().flat_map(|b| b.add.iter().map(|a| &a.cname_from)).collect();
        let removed: Vec<&String> = batches.iter().flat_map(|b| &b.remove).collect();

        let added_set: HashSet<&String> = added.iter().copied().collect();
        assert_eq!(added.len(), added_set.len(), "no duplicate adds");
        let expected_adds: HashSet<String> =
            ["www5.example.com", "fresh.example.com"].iter().map(|s| s.to_string()).collect();
        assert_eq!(added_set, expected_adds.iter().collect());

        // www30..www39 and legacy are dropped; www5 is retired before re-add.
        assert_eq!(removed.len(), 12);
        assert!(removed.contains(&&"legacy.example.com".to_string()));
        assert!(removed.contains(&&"www5.example.com".to_string()));
        assert_eq!(batches[0].remove, vec!["www5.example.com".to_string()]);
    }

    #[test]
    fn output_is_deterministic_and_sorted() {
        let current = hostnames(25, CertProvisioningType::Default);
        let desired: HostnameMap = (10..40)
            .map(|i| (format!("www{i}.example.com"), record(CertProvisioningType::Default, 100)))
            .collect();

        let first = build(&current, &desired, 10, &metadata());
        for _ in 0..5 {
            // Rebuild the maps so their iteration order is reshuffled.
            let current: HostnameMap = current.clone().into_iter().collect();
            let desired: HostnameMap = desired.clone().into_iter().collect();
            assert_eq!(build(&current, &desired, 10, &metadata()), first);
        }

        let adds: Vec<&String> = first.iter().flat_map(|b| b.add.iter().map(|a| &a.cname_from)).collect();
        assert!(adds.windows(2).all(|w| w[0] < w[1]));
        let removes: Vec<&String> = first.iter().flat_map(|b| &b.remove).collect();
        assert!(removes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn sort_places_adds_before_removes() {
        let r = record(CertProvisioningType::Default, 1);
        let ops = vec![
            Operation::remove("a.example.com", &r),
            Operation::add("c.example.com", &r),
            Operation::remove("b.example.com", &r),
            Operation::add("b2.example.com", &r),
        ];

        let sorted: Vec<(Action, String)> = sort_operations(ops)
            .into_iter()
            .map(|op| (op.action, op.cname_from))
            .collect();

        assert_eq!(
            sorted,
            vec![
                (Action::Add, "b2.example.com".to_string()),
                (Action::Add, "c.example.com".to_string()),
                (Action::Remove, "a.example.com".to_string()),
                (Action::Remove, "b.example.com".to_string()),
            ]
        );
    }

    #[test]
    fn compute_operations_removes_old_value_for_changed_entries() {
        let mut current = HostnameMap::new();
        current.insert("www.example.com".to_string(), record(CertProvisioningType::Default, 1));
        let mut desired = HostnameMap::new();
        desired.insert("www.example.com".to_string(), record(CertProvisioningType::Default, 2));

        let (priority, ops) = compute_operations(&current, &desired);

        assert_eq!(priority.len(), 1);
        assert_eq!(priority[0].action, Action::Remove);
        assert_eq!(priority[0].edge_hostname_id, "ehn_1");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Add);
        assert_eq!(ops[0].edge_hostname_id, "ehn_2");
    }

    #[test]
    fn batches_carry_metadata_and_add_fields() {
        let mut desired = HostnameMap::new();
        desired.insert("shop.example.com".to_string(), record(CertProvisioningType::CpsManaged, 42));

        let batches = build(&HostnameMap::new(), &desired, HOSTNAME_LIMIT, &metadata());

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.network, Network::Staging);
        assert_eq!(batch.note.as_deref(), Some("hostname sync"));
        assert_eq!(batch.notify_emails, vec!["ops@example.com".to_string()]);
        assert_eq!(batch.add[0].cert_provisioning_type, CertProvisioningType::CpsManaged);
        assert_eq!(batch.add[0].edge_hostname_id, "ehn_42");
        assert_eq!(batch.add[0].cname_from, "shop.example.com");
    }

    #[test]
    fn zero_limit_is_treated_as_one() {
        let desired = hostnames(3, CertProvisioningType::Default);
        let batches = build(&HostnameMap::new(), &desired, 0, &metadata());
        assert_eq!(shape(&batches), vec![(1, 0), (1, 0), (1, 0)]);
    }

    #[test]
    fn plan_counts_operations() {
        let current = hostnames(3, CertProvisioningType::Default);
        let desired: HostnameMap = (1..5)
            .map(|i| (format!("www{i}.example.com"), record(CertProvisioningType::Default, 100)))
            .collect();
        let batches = build(&current, &desired, HOSTNAME_LIMIT, &metadata());
        let plan = Plan::new(current, batches);

        assert!(!plan.is_empty());
        assert_eq!(plan.add_count(), 2);
        assert_eq!(plan.remove_count(), 1);
    }
}
