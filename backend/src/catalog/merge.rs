use crate::catalog::model::Item;
use crate::pricing::model::PriceIndex;

/// Attaches each item's buckets from `index` to the item.
///
/// Consumes the caller-owned list and never touches the index. Items
/// without buckets end up with `prices == None`.
pub fn merge_prices(items: Vec<Item>, index: &PriceIndex) -> Vec<Item> {
    items
        .into_iter()
        .map(|mut item| {
            item.prices = index.prices_for(&item.id);
            item
        })
        .collect()
}
