use crate::schema::SortOrder;
use crate::LedgerEntry;
use std::cmp::Ordering;

fn compare(a: &LedgerEntry, b: &LedgerEntry, order: SortOrder) -> Ordering {
    let ascending = a
        .date
        .cmp(&b.date)
        .then_with(|| a.created_at.cmp(&b.created_at));

    match order {
        SortOrder::Ascending => ascending,
        SortOrder::Descending => ascending.reverse(),
    }
}

/// Orders entries by business date, then by creation time, in the given
/// direction. The sort is stable: entries sharing both keys keep their input
/// order.
pub fn sort_entries(mut entries: Vec<LedgerEntry>, order: SortOrder) -> Vec<LedgerEntry> {
    sort_in_place(&mut entries, order);
    entries
}

pub fn sort_in_place(entries: &mut [LedgerEntry], order: SortOrder) {
    entries.sort_by(|a, b| compare(a, b, order));
}
