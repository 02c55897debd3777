use crate::feed::NewsEntry;

/// Newest first, ties keep their input order, then truncate to `max_items`.
///
/// Callers clamp `max_items` beforehand; this truncates to exactly that value.
pub fn rank(mut entries: Vec<NewsEntry>, max_items: usize) -> Vec<NewsEntry> {
    // sort_by is stable
    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    entries.truncate(max_items);
    entries
}
