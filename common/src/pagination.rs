//! Abstractions for forward (newest-first) pagination.

/// Generic pagination connection.
#[derive(Clone, Debug)]
pub struct Connection<C, I> {
    /// [`Edge`]s in this [`Connection`].
    pub edges: Vec<Edge<C, I>>,

    /// Indicator whether this [`Connection`] has more nodes.
    pub has_more: bool,
}

/// A page in a [`Connection`].
pub type Page<C, I> = Connection<C, I>;

impl<C, I> Connection<C, I> {
    /// Creates a new [`Connection`] from the provided [`Edge`]s.
    #[must_use]
    pub fn new(
        edges: impl IntoIterator<Item = impl Into<Edge<C, I>>>,
        has_more: bool,
    ) -> Self {
        Self {
            edges: edges.into_iter().map(Into::into).collect::<Vec<_>>(),
            has_more,
        }
    }

    /// Returns [`PageInfo`] of this [`Connection`].
    #[must_use]
    pub fn page_info(&self) -> PageInfo<C>
    where
        C: Clone,
    {
        PageInfo {
            end_cursor: self.edges.last().map(|e| e.cursor.clone()),
            has_next_page: self.has_more,
        }
    }
}

/// Information about a page in a [`Connection`].
#[derive(Clone, Copy, Debug)]
pub struct PageInfo<C> {
    /// Last cursor on this page.
    pub end_cursor: Option<C>,

    /// Indicator whether [`Connection`] has a next page.
    pub has_next_page: bool,
}

/// An edge in a [`Connection`].
#[derive(Clone, Copy, Debug)]
pub struct Edge<C, I> {
    /// Cursor of this [`Edge`].
    pub cursor: C,

    /// Node of this [`Edge`].
    pub node: I,
}

impl<C, I> From<(C, I)> for Edge<C, I> {
    fn from((cursor, node): (C, I)) -> Self {
        Self { cursor, node }
    }
}

/// Pagination arguments.
#[derive(Clone, Copy, Debug)]
pub struct Arguments<C> {
    /// Number of items to return.
    pub first: usize,

    /// Cursor after which the items should be returned.
    pub after: Option<C>,
}

impl<C> Arguments<C> {
    /// Creates a new [`Arguments`], falling back to the `default` page size
    /// and clamping to the `max` one.
    pub fn new<Num>(
        first: Option<Num>,
        after: Option<C>,
        default: Num,
        max: Num,
    ) -> Option<Self>
    where
        Num: TryInto<usize>,
    {
        let max = max.try_into().ok()?;
        let first = match first {
            Some(n) => n.try_into().ok()?,
            None => default.try_into().ok()?,
        };

        Some(Self {
            first: first.min(max),
            after,
        })
    }

    /// Returns limit requested by this [`Arguments`].
    ///
    /// One more than [`Arguments::first`], so a full page reveals whether a
    /// next one exists.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.first.saturating_add(1)
    }
}

/// Pagination selector.
#[derive(Clone, Copy, Debug)]
pub struct Selector<C, F> {
    /// Pagination [`Arguments`].
    pub arguments: Arguments<C>,

    /// Additional filter being applied to the result.
    pub filter: F,
}

/// Defines pagination types.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_pagination {
    ($cursor:ty, $node:ty, $filter:ty) => {
        #[doc = "Edge of a [`Connection`]."]
        pub type Edge = $crate::pagination::Edge<$cursor, $node>;

        #[doc = "A [`Connection`] of [`$node`]s."]
        pub type Connection = $crate::pagination::Connection<$cursor, $node>;

        #[doc = "A [`Page`] of [`$node`]s."]
        pub type Page = $crate::pagination::Page<$cursor, $node>;

        #[doc = "An information about a [`Page`]."]
        pub type PageInfo = $crate::pagination::PageInfo<$cursor>;

        #[doc = "Arguments for selecting a [`Page`]."]
        pub type Arguments = $crate::pagination::Arguments<$cursor>;

        #[doc = "[`Page`] selector."]
        pub type Selector = $crate::pagination::Selector<$cursor, $filter>;
    };
}

#[cfg(test)]
mod spec {
    use super::{Arguments, Connection};

    #[test]
    fn arguments_clamp_and_default() {
        let args = Arguments::<u64>::new(None, None, 10_i32, 100_i32).unwrap();
        assert_eq!(args.first, 10);
        assert_eq!(args.limit(), 11);

        let args =
            Arguments::<u64>::new(Some(500_i32), None, 10_i32, 100_i32)
                .unwrap();
        assert_eq!(args.first, 100);

        assert!(Arguments::<u64>::new(Some(-1_i32), None, 10, 100).is_none());
    }

    #[test]
    fn page_info_reports_last_cursor() {
        let page = Connection::new([(1_u64, "a"), (2, "b")], true);
        let info = page.page_info();

        assert_eq!(info.end_cursor, Some(2));
        assert!(info.has_next_page);

        let empty = Connection::<u64, &str>::new(None::<(u64, &str)>, false);
        let info = empty.page_info();

        assert_eq!(info.end_cursor, None);
        assert!(!info.has_next_page);
    }
}
