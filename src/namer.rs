//! # Naming of generated identifiers
//!
//! The splitter references map-side results from the reduce side purely by
//! name, so every synthetic identifier is derived from a slot index. The
//! `__T`/`__C` prefixes are reserved: callers must not accept user
//! identifiers starting with them.

/// Prefix of generated merge-table names.
pub const TABLE_PREFIX: &str = "__T";

/// Prefix of generated column aliases.
pub const COLUMN_PREFIX: &str = "__C";

/// Merge-table name for the `idx`-th split invocation.
pub fn table_name(idx: usize) -> String {
    format!("{TABLE_PREFIX}{idx}")
}

/// Column alias generated for projection slot `idx`.
pub fn column_name(idx: usize) -> String {
    format!("{COLUMN_PREFIX}{idx}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name(0), "__T0");
        assert_eq!(table_name(12), "__T12");
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "__C0");
        assert_eq!(column_name(7), "__C7");
        // Same index, same name.
        assert_eq!(column_name(7), column_name(7));
    }
}
