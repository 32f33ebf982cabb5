#[cfg(test)]
mod tests {
    use molehill::query::{DIGDAG_INSERT_LINE, indent};
    use molehill::{GenError, QueryBuilder, WithClauses, build_query};

    // ========================================================================
    // Single statements
    // ========================================================================

    #[test]
    fn test_build_simple_query() {
        let query = build_query(&["col1", "col2"], "tbl", None, false, None).unwrap();
        assert_eq!(query, "select\n  col1\n  , col2\nfrom\n  tbl\n;\n");
    }

    #[test]
    fn test_build_query_with_condition() {
        let query =
            build_query(&["col1"], "tbl", Some("where\n  col1 > 0"), false, None).unwrap();
        assert_eq!(query, "select\n  col1\nfrom\n  tbl\nwhere\n  col1 > 0\n;\n");
    }

    #[test]
    fn test_empty_condition_is_skipped() {
        let query = build_query(&["col1"], "tbl", Some(""), false, None).unwrap();
        assert_eq!(query, "select\n  col1\nfrom\n  tbl\n;\n");
    }

    #[test]
    fn test_without_semicolon() {
        let query = build_query(&["col1"], "tbl", None, true, None).unwrap();
        assert_eq!(query, "select\n  col1\nfrom\n  tbl");
    }

    #[test]
    fn test_multiline_source_is_indented() {
        let query = build_query(&["*"], "(\nselect 1\n) t", None, false, None).unwrap();
        assert_eq!(query, "select\n  *\nfrom\n  (\n  select 1\n  ) t\n;\n");
    }

    #[test]
    fn test_empty_select_is_rejected() {
        let selects: [&str; 0] = [];
        let err = build_query(&selects, "tbl", None, false, None).unwrap_err();
        assert!(matches!(err, GenError::InvalidInput(_)));
    }

    // ========================================================================
    // With clauses
    // ========================================================================

    fn single_cte() -> WithClauses {
        WithClauses::new().with("a", "select\n  x\nfrom\n  t1")
    }

    #[test]
    fn test_build_query_with_clauses() {
        let query = build_query(&["x"], "a", None, false, Some(&single_cte())).unwrap();
        let expected = "\
with a as (
  select
    x
  from
    t1
)
-- DIGDAG_INSERT_LINE
select
  x
from
  a
;
";
        assert_eq!(query, expected);
    }

    #[test]
    fn test_with_clauses_force_terminator() {
        let terminated = build_query(&["x"], "a", None, false, Some(&single_cte())).unwrap();
        let forced = build_query(&["x"], "a", None, true, Some(&single_cte())).unwrap();
        assert_eq!(forced, terminated);
        assert!(forced.ends_with("\n;\n"));
    }

    #[test]
    fn test_empty_with_clauses_are_ignored() {
        let query = build_query(&["x"], "a", None, true, Some(&WithClauses::new())).unwrap();
        assert_eq!(query, "select\n  x\nfrom\n  a");
    }

    #[test]
    fn test_multiple_clauses_keep_insertion_order() {
        let clauses: WithClauses =
            [("second", "select 2"), ("first", "select 1")].into_iter().collect();
        let query = build_query(&["*"], "first", None, false, Some(&clauses)).unwrap();

        assert!(query.starts_with("with second as (\n  select 2\n),\nfirst as (\n  select 1\n)\n"));
        assert!(query.contains(&format!(")\n{}\nselect\n", DIGDAG_INSERT_LINE)));
    }

    // ========================================================================
    // Versioned builder
    // ========================================================================

    #[test]
    fn test_unversioned_builder_matches_build_query() {
        let builder = QueryBuilder::new();
        assert_eq!(builder.version(), None);
        assert_eq!(
            builder.build(&["col1"], "tbl", None, false, None).unwrap(),
            build_query(&["col1"], "tbl", None, false, None).unwrap()
        );
    }

    #[test]
    fn test_versioned_builder_stamps_with_statements() {
        let builder = QueryBuilder::with_version("1.0.0");
        let query = builder.build(&["x"], "a", None, true, Some(&single_cte())).unwrap();
        assert!(query.starts_with("-- molehill/1.0.0\nwith a as (\n"));
    }

    #[test]
    fn test_stamp() {
        assert_eq!(QueryBuilder::with_version("1.0.0").stamp("select 1\n;\n"), "-- molehill/1.0.0\nselect 1\n;\n");
        assert_eq!(QueryBuilder::new().stamp("select 1\n;\n"), "select 1\n;\n");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb", "  "), "  a\n  b");
        assert_eq!(indent("a\n", "  "), "  a\n");
    }
}
