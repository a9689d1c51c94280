//! Filtering, sorting and marker-based pagination for range queries.

use crate::error::{RangeError, Result};
use crate::types::{NetworkType, RangeRecord};
use std::cmp::Ordering;
use std::str::FromStr;
use uuid::Uuid;

/// Exact-match filters; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFilters {
    pub name: Option<String>,
    pub network_type: Option<NetworkType>,
    pub physical_network: Option<String>,
    pub project_id: Option<String>,
    pub shared: Option<bool>,
    pub default: Option<bool>,
}

impl RangeFilters {
    pub fn matches(&self, record: &RangeRecord) -> bool {
        fn check<T: PartialEq + ?Sized>(wanted: Option<&T>, actual: Option<&T>) -> bool {
            wanted.map_or(true, |w| actual == Some(w))
        }

        check(self.name.as_deref(), record.name.as_deref())
            && check(self.network_type.as_ref(), Some(&record.network_type))
            && check(self.physical_network.as_deref(), record.physical_network.as_deref())
            && check(self.project_id.as_deref(), record.project_id.as_deref())
            && check(self.shared.as_ref(), Some(&record.shared))
            && check(self.default.as_ref(), Some(&record.default))
    }
}

/// Range attributes that can be sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Name,
    NetworkType,
    PhysicalNetwork,
    ProjectId,
    Minimum,
    Maximum,
}

impl SortField {
    fn compare(&self, a: &RangeRecord, b: &RangeRecord) -> Ordering {
        match self {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Name => a.name.cmp(&b.name),
            SortField::NetworkType => a.network_type.as_str().cmp(b.network_type.as_str()),
            SortField::PhysicalNetwork => a.physical_network.cmp(&b.physical_network),
            SortField::ProjectId => a.project_id.cmp(&b.project_id),
            SortField::Minimum => a.minimum.cmp(&b.minimum),
            SortField::Maximum => a.maximum.cmp(&b.maximum),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "name" => Ok(SortField::Name),
            "network_type" => Ok(SortField::NetworkType),
            "physical_network" => Ok(SortField::PhysicalNetwork),
            "project_id" => Ok(SortField::ProjectId),
            "minimum" => Ok(SortField::Minimum),
            "maximum" => Ok(SortField::Maximum),
            other => Err(format!("cannot sort on '{}'", other)),
        }
    }
}

/// One sort criterion, written as `field` or `field:asc` / `field:desc`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub ascending: bool,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (field, direction) = s.split_once(':').unwrap_or((s, "asc"));
        let ascending = match direction {
            "asc" => true,
            "desc" => false,
            other => return Err(format!("unknown sort direction '{}'", other)),
        };
        Ok(SortKey {
            field: field.parse()?,
            ascending,
        })
    }
}

/// Sort and page settings for a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pager {
    pub sorts: Vec<SortKey>,
    pub limit: Option<usize>,
    /// Id of the last row of the previous page
    pub marker: Option<Uuid>,
    /// Walk backwards from the marker
    pub page_reverse: bool,
}

impl Pager {
    fn compare(&self, a: &RangeRecord, b: &RangeRecord) -> Ordering {
        self.sorts
            .iter()
            .map(|key| {
                let ordering = key.field.compare(a, b);
                if key.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Sort `rows` and cut out the requested page.
    ///
    /// With `page_reverse` the page is taken walking backwards from the
    /// marker but is still returned in forward sort order.
    pub fn apply(&self, mut rows: Vec<RangeRecord>) -> Result<Vec<RangeRecord>> {
        rows.sort_by(|a, b| self.compare(a, b));
        if self.page_reverse {
            rows.reverse();
        }

        let start = match self.marker {
            Some(marker) => rows
                .iter()
                .position(|record| record.id == marker)
                .map(|index| index + 1)
                .ok_or(RangeError::NotFound { range_id: marker })?,
            None => 0,
        };

        let mut page: Vec<RangeRecord> = rows
            .into_iter()
            .skip(start)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        if self.page_reverse {
            page.reverse();
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlan(physnet: &str, minimum: u32, shared: bool) -> RangeRecord {
        RangeRecord::new(
            Uuid::new_v4(),
            Some(format!("{}-{}", physnet, minimum)),
            false,
            shared,
            Some("p1".to_string()),
            NetworkType::Vlan,
            Some(physnet.to_string()),
            minimum,
            minimum + 9,
        )
    }

    fn minimums(rows: &[RangeRecord]) -> Vec<u32> {
        rows.iter().map(|r| r.minimum).collect()
    }

    #[test]
    fn test_filters() {
        let shared = vlan("physnet1", 10, true);
        let private = vlan("physnet2", 20, false);

        let by_physnet = RangeFilters {
            physical_network: Some("physnet2".to_string()),
            ..Default::default()
        };
        assert!(!by_physnet.matches(&shared));
        assert!(by_physnet.matches(&private));

        let by_project = RangeFilters {
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        // shared ranges carry no project
        assert!(!by_project.matches(&shared));
        assert!(by_project.matches(&private));

        assert!(RangeFilters::default().matches(&shared));
    }

    #[test]
    fn test_sort_key_parsing() {
        let key: SortKey = "minimum:desc".parse().unwrap();
        assert_eq!(key.field, SortField::Minimum);
        assert!(!key.ascending);
        assert!("name".parse::<SortKey>().unwrap().ascending);
        assert!("minimum:sideways".parse::<SortKey>().is_err());
        assert!("colour".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_marker_pagination_forward_and_reverse() {
        let rows: Vec<RangeRecord> = [30, 10, 50, 20, 40].iter().map(|m| vlan("physnet1", *m, true)).collect();
        let sorted_by_min = Pager {
            sorts: vec!["minimum".parse().unwrap()],
            limit: Some(2),
            ..Default::default()
        };

        let first = sorted_by_min.apply(rows.clone()).unwrap();
        assert_eq!(minimums(&first), vec![10, 20]);

        let second = Pager {
            marker: Some(first[1].id),
            ..sorted_by_min.clone()
        }
        .apply(rows.clone())
        .unwrap();
        assert_eq!(minimums(&second), vec![30, 40]);

        let back = Pager {
            marker: Some(second[0].id),
            page_reverse: true,
            ..sorted_by_min.clone()
        }
        .apply(rows.clone())
        .unwrap();
        assert_eq!(minimums(&back), vec![10, 20]);

        let descending = Pager {
            sorts: vec!["minimum:desc".parse().unwrap()],
            ..Default::default()
        }
        .apply(rows)
        .unwrap();
        assert_eq!(minimums(&descending), vec![50, 40, 30, 20, 10]);
    }

    #[test]
    fn test_unknown_marker_is_not_found() {
        let marker = Uuid::new_v4();
        let pager = Pager {
            marker: Some(marker),
            ..Default::default()
        };
        match pager.apply(vec![vlan("physnet1", 1, true)]) {
            Err(RangeError::NotFound { range_id }) => assert_eq!(range_id, marker),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
