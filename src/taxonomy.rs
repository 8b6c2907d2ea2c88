//! Category taxonomy and per-category tallies.
//!
//! The taxonomy is the closed set of labels the counter recognizes. Its order is the
//! column order of every persisted record, so it is fixed for the lifetime of a run.

use anyhow::{anyhow, Result};

/// Default categories as `(detector label, CSV column)` pairs, in column order.
pub const DEFAULT_CATEGORIES: [(&str, &str); 7] = [
    ("bus", "Buses"),
    ("car", "Cars"),
    ("jeepney", "Jeepneys"),
    ("motorcycle", "Motorcycles"),
    ("pickup-truck", "Pickup_Trucks"),
    ("truck", "Trucks"),
    ("van", "Vans"),
];

/// Columns preceding the per-category columns in every record.
pub const LEADING_COLUMNS: [&str; 3] = ["Timestamp", "Elapsed_Time_Seconds", "Vehicle_Count"];

/// One countable category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    label: String,
    column: String,
}

impl Category {
    /// Create a category. Labels are matched case-insensitively and stored lower-cased.
    pub fn new(label: &str, column: &str) -> Result<Self> {
        let label = label.trim().to_lowercase();
        let column = column.trim().to_string();
        if label.is_empty() {
            return Err(anyhow!("category label must not be empty"));
        }
        if column.is_empty() {
            return Err(anyhow!("column name for category '{}' must not be empty", label));
        }
        if column.contains([',', '"', '\n', '\r']) {
            return Err(anyhow!(
                "column name '{}' must not contain commas, quotes or line breaks",
                column
            ));
        }
        Ok(Self { label, column })
    }

    /// Category whose column name is its label.
    pub fn from_label(label: &str) -> Result<Self> {
        Self::new(label, label)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// Ordered, immutable set of categories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            return Err(anyhow!("taxonomy must contain at least one category"));
        }
        for (i, category) in categories.iter().enumerate() {
            let earlier = &categories[..i];
            if earlier.iter().any(|c| c.label == category.label) {
                return Err(anyhow!("duplicate category label '{}'", category.label));
            }
            if earlier.iter().any(|c| c.column == category.column) {
                return Err(anyhow!("duplicate column name '{}'", category.column));
            }
            if LEADING_COLUMNS.contains(&category.column.as_str()) {
                return Err(anyhow!(
                    "column name '{}' collides with a fixed column",
                    category.column
                ));
            }
        }
        Ok(Self { categories })
    }

    /// Build a taxonomy from bare labels, using each label as its column name.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let categories = labels
            .iter()
            .map(|label| Category::from_label(label.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(categories)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Position of a detector label, compared lower-cased. `None` for unknown labels.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        let label = label.to_lowercase();
        self.categories.iter().position(|c| c.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Full header: fixed leading columns followed by one column per category.
    pub fn header(&self) -> Vec<&str> {
        LEADING_COLUMNS
            .iter()
            .copied()
            .chain(self.categories.iter().map(|c| c.column.as_str()))
            .collect()
    }

    /// Zeroed tally shaped for this taxonomy.
    pub fn empty_tally(&self) -> FrameTally {
        FrameTally::zeroed(self.categories.len())
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(label, column)| Category {
                    label: label.to_string(),
                    column: column.to_string(),
                })
                .collect(),
        }
    }
}

/// Per-category counts plus a total.
///
/// Used both for a single frame and for the running window; the shape is always
/// that of the taxonomy which produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameTally {
    total: u64,
    counts: Vec<u64>,
}

impl FrameTally {
    pub fn zeroed(categories: usize) -> Self {
        Self {
            total: 0,
            counts: vec![0; categories],
        }
    }

    /// Count one object of the category at `index`.
    pub fn record(&mut self, index: usize) {
        if let Some(count) = self.counts.get_mut(index) {
            *count += 1;
            self.total += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn get(&self, index: usize) -> u64 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Count for a label, or zero when the label is not in `taxonomy`.
    pub fn count_of(&self, taxonomy: &Taxonomy, label: &str) -> u64 {
        taxonomy.index_of(label).map(|i| self.get(i)).unwrap_or(0)
    }

    /// Fold another tally of the same shape into this one.
    pub fn absorb(&mut self, other: &FrameTally) {
        if self.counts.len() < other.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.total += other.total;
    }

    pub fn reset(&mut self) {
        self.total = 0;
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn is_zero(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_taxonomy_matches_column_order() {
        let taxonomy = Taxonomy::default();
        assert_eq!(
            taxonomy.labels().collect::<Vec<_>>(),
            vec!["bus", "car", "jeepney", "motorcycle", "pickup-truck", "truck", "van"]
        );
        assert_eq!(
            taxonomy.header(),
            vec![
                "Timestamp",
                "Elapsed_Time_Seconds",
                "Vehicle_Count",
                "Buses",
                "Cars",
                "Jeepneys",
                "Motorcycles",
                "Pickup_Trucks",
                "Trucks",
                "Vans"
            ]
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_closed() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy.index_of("Car"), Some(1));
        assert_eq!(taxonomy.index_of("PICKUP-TRUCK"), Some(4));
        assert_eq!(taxonomy.index_of("pedestrian"), None);
    }

    #[test]
    fn rejects_duplicates_and_bad_columns() {
        assert!(Taxonomy::from_labels(&["car", "Car"]).is_err());
        assert!(Taxonomy::from_labels::<&str>(&[]).is_err());
        assert!(Category::new("car", "Cars,Trucks").is_err());
        assert!(Category::new("  ", "Cars").is_err());
        assert!(Taxonomy::new(vec![Category::new("x", "Timestamp").unwrap()]).is_err());
    }

    #[test]
    fn tallies_absorb_and_reset() {
        let taxonomy = Taxonomy::from_labels(&["car", "bus"]).unwrap();
        let mut window = taxonomy.empty_tally();
        let mut frame = taxonomy.empty_tally();
        frame.record(0);
        frame.record(0);
        frame.record(1);
        frame.record(7);

        window.absorb(&frame);
        window.absorb(&frame);
        assert_eq!(window.total(), 6);
        assert_eq!(window.count_of(&taxonomy, "car"), 4);
        assert_eq!(window.count_of(&taxonomy, "bus"), 2);
        assert_eq!(window.count_of(&taxonomy, "van"), 0);

        window.reset();
        assert!(window.is_zero());
        assert_eq!(window.counts(), &[0, 0]);
    }
}
