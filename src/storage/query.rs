/// Whether the upper bound of a range is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToIntervalOption {
    #[default]
    IncludeTo,
    ExcludeTo,
}

/// Predicate over one half of the composite key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyFilter {
    #[default]
    Any,
    Equal(String),
    OneOf(Vec<String>),
    AtLeast(String),
    Between {
        from: String,
        to: String,
        interval: ToIntervalOption,
    },
}

impl KeyFilter {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Equal(expected) => key == expected,
            Self::OneOf(candidates) => candidates.iter().any(|candidate| candidate == key),
            Self::AtLeast(from) => key >= from.as_str(),
            Self::Between { from, to, interval } => {
                key >= from.as_str()
                    && match interval {
                        ToIntervalOption::IncludeTo => key <= to.as_str(),
                        ToIntervalOption::ExcludeTo => key < to.as_str(),
                    }
            }
        }
    }
}

/// Typed scan filter handed to [`TableStorage::scan`](super::TableStorage::scan).
///
/// ```
/// use tablecas::{TableQuery, ToIntervalOption};
///
/// let query = TableQuery::partition("orders")
///     .row_key_between("2024-01", "2024-02", ToIntervalOption::ExcludeTo)
///     .take(50);
/// assert!(query.matches("orders", "2024-01-15"));
/// assert!(!query.matches("orders", "2024-02"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableQuery {
    pub partition: KeyFilter,
    pub row: KeyFilter,
    pub take: Option<usize>,
}

impl TableQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition: KeyFilter::Equal(partition_key.into()),
            ..Self::default()
        }
    }

    pub fn partitions<I, S>(partition_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            partition: KeyFilter::OneOf(partition_keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn partition_between(
        from: impl Into<String>,
        to: impl Into<String>,
        interval: ToIntervalOption,
    ) -> Self {
        Self {
            partition: KeyFilter::Between {
                from: from.into(),
                to: to.into(),
                interval,
            },
            ..Self::default()
        }
    }

    /// Same query restricted to one partition.
    pub fn in_partition(mut self, partition_key: impl Into<String>) -> Self {
        self.partition = KeyFilter::Equal(partition_key.into());
        self
    }

    pub fn row_key(mut self, row_key: impl Into<String>) -> Self {
        self.row = KeyFilter::Equal(row_key.into());
        self
    }

    pub fn row_keys<I, S>(mut self, row_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.row = KeyFilter::OneOf(row_keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn row_key_from(mut self, row_key: impl Into<String>) -> Self {
        self.row = KeyFilter::AtLeast(row_key.into());
        self
    }

    pub fn row_key_between(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        interval: ToIntervalOption,
    ) -> Self {
        self.row = KeyFilter::Between {
            from: from.into(),
            to: to.into(),
            interval,
        };
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }

    pub fn matches(&self, partition_key: &str, row_key: &str) -> bool {
        self.partition.matches(partition_key) && self.row.matches(row_key)
    }
}
