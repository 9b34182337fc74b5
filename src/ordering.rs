/// Sort parameter validation for list endpoints
///
/// Client-supplied `order_by`/`order_type` values are matched against a
/// per-entity allow-list of columns and the two direction tokens. Anything
/// else silently falls back to the default `id DESC` so listing endpoints
/// never fail on a bad sort parameter. The validated pair renders to
/// `&'static str` fragments, so raw client input never reaches query text.

/// Columns on which an entity's list endpoint may be ordered.
pub trait SortColumn: Copy {
    /// Parse a client-supplied column name; None for anything outside the
    /// allow-list.
    fn parse(input: &str) -> Option<Self>
    where
        Self: Sized;

    /// The column identifier as it appears in SQL.
    fn as_sql(&self) -> &'static str;

    /// Fallback column when the input is absent or rejected.
    fn default_column() -> Self
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(input: &str) -> Option<Self> {
        if input.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if input.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSortColumn {
    Id,
    Author,
    Content,
    CommentsCount,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for PostSortColumn {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "id" => Some(Self::Id),
            "author" => Some(Self::Author),
            "content" => Some(Self::Content),
            "comments_count" => Some(Self::CommentsCount),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Author => "author",
            Self::Content => "content",
            Self::CommentsCount => "comments_count",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn default_column() -> Self {
        Self::Id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSortColumn {
    Id,
    PostId,
    Author,
    Content,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for CommentSortColumn {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "id" => Some(Self::Id),
            "post_id" => Some(Self::PostId),
            "author" => Some(Self::Author),
            "content" => Some(Self::Content),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::PostId => "post_id",
            Self::Author => "author",
            Self::Content => "content",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn default_column() -> Self {
        Self::Id
    }
}

/// A validated (column, direction) pair safe to splice into ORDER BY.
#[derive(Debug, Clone, Copy)]
pub struct Ordering<C: SortColumn> {
    pub column: C,
    pub direction: SortDirection,
}

impl<C: SortColumn> Ordering<C> {
    /// Validate client input, falling back to `id DESC` field by field.
    pub fn from_params(order_by: Option<&str>, order_type: Option<&str>) -> Self {
        let column = order_by
            .and_then(C::parse)
            .unwrap_or_else(C::default_column);
        let direction = order_type
            .and_then(SortDirection::parse)
            .unwrap_or(SortDirection::Desc);

        Self { column, direction }
    }

    /// Render as an ORDER BY fragment built only from static strings.
    pub fn order_clause(&self) -> String {
        format!("{} {}", self.column.as_sql(), self.direction.as_sql())
    }
}

impl<C: SortColumn> Default for Ordering<C> {
    fn default() -> Self {
        Self::from_params(None, None)
    }
}
