//! Top-level pagination links.

use std::collections::BTreeMap;

use url::Url;

use crate::query::spec::PageDescriptor;

const PAGE_NUMBER: &str = "page[number]";
const PAGE_SIZE: &str = "page[size]";

/// Builds `self`, `first`, `last`, `prev` and `next` links.
///
/// `base` is the request URL; its other query parameters are preserved and
/// the page parameters are rewritten. `prev`/`next` are omitted at the ends.
pub fn pagination_links(base: &Url, page: &PageDescriptor, total: u64) -> BTreeMap<String, String> {
    let last = page.last_page(total);
    let mut links = BTreeMap::new();
    links.insert("self".to_owned(), page_url(base, page.number, page.size));
    links.insert("first".to_owned(), page_url(base, 1, page.size));
    links.insert("last".to_owned(), page_url(base, last, page.size));
    if page.number > 1 {
        let prev = (page.number - 1).min(last);
        links.insert("prev".to_owned(), page_url(base, prev, page.size));
    }
    if page.number < last {
        links.insert("next".to_owned(), page_url(base, page.number + 1, page.size));
    }
    links
}

fn page_url(base: &Url, number: u64, size: u64) -> String {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != PAGE_NUMBER && key != PAGE_SIZE)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut url = base.clone();
    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(retained)
        .append_pair(PAGE_NUMBER, &number.to_string())
        .append_pair(PAGE_SIZE, &size.to_string());
    url.to_string()
}
