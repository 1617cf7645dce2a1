use std::collections::BTreeMap;

use crate::schema::{CartLine, ShoppingItem};

/// Sums cart lines per (ingredient name, measurement unit).
///
/// The result is ordered by name, then unit. The same name measured in two
/// different units stays two rows.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for line in lines {
        *totals
            .entry((line.name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingItem {
            name,
            total_amount,
            measurement_unit,
        })
        .collect()
}
