use shelf_catalog::FieldUpdate;
use shelf_catalog::fields::{SERIES, SERIES_INDEX};

/// Index the catalog assumes for a book in a series without a position.
pub const DEFAULT_SERIES_INDEX: f64 = 1.0;

/// Updates needed to move a book's series from `current` to `desired`.
///
/// - Names equal, and either no series is wanted or the indices match:
///   nothing to do.
/// - No series wanted, but one is set: clear the name and reset the index.
/// - Both the name and the index differ: write both.
/// - Only the name differs: write the name.
/// - Only the index differs: write the index.
pub fn updates(current: (Option<&str>, f64), desired: Option<(&str, f64)>) -> Vec<FieldUpdate> {
    let (current_name, current_index) = current;
    let desired_name = desired.map(|(name, _)| name);
    let names_equal = current_name == desired_name;
    let indices_equal = desired.is_none_or(|(_, index)| index == current_index);

    match desired {
        _ if names_equal && (desired.is_none() || indices_equal) => Vec::new(),
        None => vec![FieldUpdate::clear(SERIES), FieldUpdate::single(SERIES_INDEX, "0")],
        Some((name, index)) if !names_equal && !indices_equal => {
            vec![FieldUpdate::single(SERIES, name), FieldUpdate::single(SERIES_INDEX, index.to_string())]
        },
        Some((name, _)) if !names_equal => vec![FieldUpdate::single(SERIES, name)],
        Some((_, index)) => vec![FieldUpdate::single(SERIES_INDEX, index.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rendered(updates: Vec<FieldUpdate>) -> Vec<String> {
        updates.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    // (a) no-op
    #[case((Some("Barsoom"), 2.0), Some(("Barsoom", 2.0)), &[])]
    #[case((None, 1.0), None, &[])]
    // (b) clear
    #[case((Some("Barsoom"), 2.0), None, &["series:", "series_index:0"])]
    // (c) both
    #[case((Some("Barsoom"), 2.0), Some(("Venus", 3.0)), &["series:Venus", "series_index:3"])]
    #[case((None, 1.0), Some(("Venus", 3.0)), &["series:Venus", "series_index:3"])]
    // (d) one of them
    #[case((Some("Barsoom"), 2.0), Some(("Venus", 2.0)), &["series:Venus"])]
    #[case((Some("Barsoom"), 2.0), Some(("Barsoom", 2.5)), &["series_index:2.5"])]
    fn test_updates(#[case] current: (Option<&str>, f64), #[case] desired: Option<(&str, f64)>, #[case] expected: &[&str]) {
        assert_eq!(rendered(updates(current, desired)), expected);
    }

    #[test]
    fn test_applying_updates_reaches_fixed_point() {
        let desired = Some(("Venus", 4.0));
        let mut state: (Option<String>, f64) = (Some("Barsoom".to_string()), 2.0);
        for update in updates((state.0.as_deref(), state.1), desired) {
            match update.field.as_str() {
                SERIES => state.0 = update.values.first().cloned(),
                SERIES_INDEX => state.1 = update.value().parse().unwrap(),
                _ => unreachable!(),
            }
        }
        assert!(updates((state.0.as_deref(), state.1), desired).is_empty());
    }
}
