//! Grouping of triangle rows into aggregate groups

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::warn;
use ndarray::Array4;

use super::data::{IndexFrame, Triangle};
use crate::error::{Error, Result};

/// How rows are assigned to groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// Group by the labels of one or more named index levels
    Levels(Vec<String>),
    /// One explicit group label per row, in row order
    Labels(Vec<String>),
}

/// Function deriving a grouping key from a triangle
pub type KeyFn = dyn Fn(&Triangle) -> GroupKey + Send + Sync;

/// Grouping configuration: a fixed key, or one derived from each triangle
#[derive(Clone)]
pub enum GroupingSpec {
    Fixed(GroupKey),
    Derived(Arc<KeyFn>),
}

impl GroupingSpec {
    /// Group by named index levels
    pub fn levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupingSpec::Fixed(GroupKey::Levels(levels.into_iter().map(Into::into).collect()))
    }

    /// Derive the key from the triangle being grouped
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&Triangle) -> GroupKey + Send + Sync + 'static,
    {
        GroupingSpec::Derived(Arc::new(f))
    }

    /// Key to apply to `triangle`
    pub fn resolve(&self, triangle: &Triangle) -> GroupKey {
        match self {
            GroupingSpec::Fixed(key) => key.clone(),
            GroupingSpec::Derived(f) => f(triangle),
        }
    }
}

impl fmt::Debug for GroupingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingSpec::Fixed(key) => f.debug_tuple("Fixed").field(key).finish(),
            GroupingSpec::Derived(_) => f.write_str("Derived(<fn>)"),
        }
    }
}

/// Rows of a triangle partitioned into groups, ordered by group label
#[derive(Debug)]
pub struct TriangleGroupBy<'a> {
    triangle: &'a Triangle,
    names: Vec<String>,
    groups: BTreeMap<Vec<String>, Vec<usize>>,
}

impl Triangle {
    /// Partition rows by `key`
    pub fn groupby(&self, key: &GroupKey) -> Result<TriangleGroupBy<'_>> {
        let index = self.index();
        let (names, labels): (Vec<String>, Vec<Vec<String>>) = match key {
            GroupKey::Levels(levels) => {
                if levels.is_empty() {
                    return Err(Error::invalid("groupby", "at least one index level is required"));
                }
                let positions = levels
                    .iter()
                    .map(|l| index.level_position(l))
                    .collect::<Result<Vec<_>>>()?;
                let labels = index
                    .rows()
                    .iter()
                    .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                    .collect();
                (levels.clone(), labels)
            }
            GroupKey::Labels(labels) => {
                if labels.len() != index.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "{} group labels for {} rows",
                        labels.len(),
                        index.len()
                    )));
                }
                (vec!["group".to_string()], labels.iter().map(|l| vec![l.clone()]).collect())
            }
        };

        let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
        for (row, label) in labels.into_iter().enumerate() {
            groups.entry(label).or_default().push(row);
        }

        Ok(TriangleGroupBy {
            triangle: self,
            names,
            groups,
        })
    }
}

impl<'a> TriangleGroupBy<'a> {
    /// Member rows of each group
    pub fn indices(&self) -> &BTreeMap<Vec<String>, Vec<usize>> {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Aggregate position of every original row
    pub fn row_assignment(&self) -> Vec<usize> {
        let mut assignment = vec![0; self.triangle.index().len()];
        for (position, rows) in self.groups.values().enumerate() {
            for &row in rows {
                assignment[row] = position;
            }
        }
        assignment
    }

    /// Sum member rows per group
    ///
    /// Missing cells are skipped; a cell missing in every member stays missing.
    /// Adjustments carry over only when they apply uniformly to all rows.
    pub fn sum(&self) -> Result<Triangle> {
        let source = self.triangle;
        let (_, n_col, n_orig, n_dev) = source.shape();
        let assignment = self.row_assignment();

        let mut summed = Array4::from_elem((self.groups.len(), n_col, n_orig, n_dev), f64::NAN);
        for ((row, c, o, d), &v) in source.values().indexed_iter() {
            if v.is_nan() {
                continue;
            }
            let cell = &mut summed[[assignment[row], c, o, d]];
            *cell = if cell.is_nan() { v } else { *cell + v };
        }

        let index = IndexFrame::new(self.names.clone(), self.groups.keys().cloned().collect())?;
        let mut grouped = Triangle::new(
            summed,
            index,
            source.columns().to_vec(),
            source.origin().to_vec(),
            source.origin_grain(),
            source.development().to_vec(),
        )?;

        if let Some(trend) = source.attached_trend() {
            if trend.factors().is_uniform_across_rows() {
                grouped = grouped.with_trend(trend.clone())?;
            } else {
                warn!("Dropping per-row trend adjustment while summing {} rows into {} groups",
                    assignment.len(), self.groups.len());
            }
        }
        if let Some(olf) = source.attached_olf() {
            if olf.factors().is_uniform_across_rows() {
                grouped = grouped.with_olf(olf.clone())?;
            } else {
                warn!("Dropping per-row on-level factors while summing {} rows into {} groups",
                    assignment.len(), self.groups.len());
            }
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangle::{fixtures, OnLevelFactor, OriginFactors, TrendAdjustment};
    use ndarray::Array3;

    fn three_rows() -> Triangle {
        let nan = f64::NAN;
        fixtures::annual(
            &["home", "auto", "auto"],
            2020,
            &[12, 24],
            &[
                vec![vec![1.0, 2.0], vec![3.0, nan]],
                vec![vec![10.0, 20.0], vec![nan, nan]],
                vec![vec![100.0, 200.0], vec![300.0, nan]],
            ],
        )
    }

    #[test]
    fn test_groups_sorted_by_label() {
        let tri = three_rows();
        let grouped = tri.groupby(&GroupKey::Levels(vec!["lob".into()])).unwrap();
        let keys: Vec<_> = grouped.indices().keys().cloned().collect();
        assert_eq!(keys, vec![vec!["auto".to_string()], vec!["home".to_string()]]);
        assert_eq!(grouped.indices()[&vec!["auto".to_string()]], vec![1, 2]);
        assert_eq!(grouped.row_assignment(), vec![1, 0, 0]);
    }

    #[test]
    fn test_sum_skips_missing() {
        let tri = three_rows();
        let summed = tri.groupby(&GroupKey::Levels(vec!["lob".into()])).unwrap().sum().unwrap();
        assert_eq!(summed.shape(), (2, 1, 2, 2));
        assert_eq!(summed.values()[[0, 0, 0, 1]], 220.0);
        assert_eq!(summed.values()[[0, 0, 1, 0]], 300.0);
        assert!(summed.values()[[0, 0, 1, 1]].is_nan());
        assert_eq!(summed.index().rows()[1], vec!["home".to_string()]);
    }

    #[test]
    fn test_explicit_labels_must_cover_rows() {
        let tri = three_rows();
        let short = GroupKey::Labels(vec!["x".into()]);
        assert!(matches!(tri.groupby(&short), Err(Error::ShapeMismatch(_))));
        let missing = GroupKey::Levels(vec!["state".into()]);
        assert!(matches!(tri.groupby(&missing), Err(Error::UnknownIndexLevel(_))));
    }

    #[test]
    fn test_derived_key() {
        let grouping = GroupingSpec::derived(|t: &Triangle| {
            GroupKey::Labels(vec!["all".to_string(); t.index().len()])
        });
        let tri = three_rows();
        let key = grouping.resolve(&tri);
        assert_eq!(tri.groupby(&key).unwrap().len(), 1);
    }

    #[test]
    fn test_sum_keeps_uniform_adjustments() {
        let by_lob = GroupKey::Levels(vec!["lob".into()]);
        let olf = OnLevelFactor::new(OriginFactors::uniform(&[1.1, 1.0]).unwrap());
        let trend = TrendAdjustment::new(OriginFactors::uniform(&[1.05, 1.0]).unwrap());
        let tri = three_rows().with_olf(olf.clone()).unwrap().with_trend(trend.clone()).unwrap();

        let summed = tri.groupby(&by_lob).unwrap().sum().unwrap();
        assert_eq!(summed.attached_olf(), Some(&olf));
        assert_eq!(summed.attached_trend(), Some(&trend));
    }

    #[test]
    fn test_sum_drops_per_row_adjustments() {
        let by_lob = GroupKey::Levels(vec!["lob".into()]);
        let per_row = |seed: f64| {
            OriginFactors::new(Array3::from_shape_fn((3, 1, 2), |(g, _, o)| seed + (g + o) as f64 / 10.0)).unwrap()
        };
        let tri = three_rows()
            .with_olf(OnLevelFactor::new(per_row(1.0)))
            .unwrap()
            .with_trend(TrendAdjustment::new(per_row(1.2)))
            .unwrap();

        let summed = tri.groupby(&by_lob).unwrap().sum().unwrap();
        assert!(summed.attached_olf().is_none());
        assert!(summed.attached_trend().is_none());
        // Values are still pooled
        assert_eq!(summed.values()[[0, 0, 0, 1]], 220.0);
    }
}
