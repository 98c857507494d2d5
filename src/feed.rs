//! Lane-based feed pagination.
//!
//! A page is built from a fixed-size slice of every lane (video, microblog,
//! comments, in that order), concatenated.  Items are never interleaved or
//! re-sorted across lanes, so page `n` always shows the `n`-th block of
//! each source.  Building a page is a few `Arc` clones and slice copies; it
//! never touches the network or the database.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::SourceCache;
use crate::source::FeedItem;

/// One page of the combined feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub page: u32,
    pub max_pages: u32,
}

pub struct FeedPaginator {
    lanes: Vec<Arc<SourceCache>>,
    per_source: usize,
    max_pages: u32,
}

impl FeedPaginator {
    /// `lanes` are read in the order given.
    pub fn new(lanes: Vec<Arc<SourceCache>>, per_source: usize, max_pages: u32) -> Self {
        Self {
            lanes,
            per_source,
            max_pages,
        }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    #[cfg(test)]
    pub fn per_source(&self) -> usize {
        self.per_source
    }

    /// Build page `page` (1-based).  Pages outside `1..=max_pages` are
    /// empty rather than an error; range checks belong to the caller.
    pub fn build_page(&self, page: u32) -> FeedPage {
        let mut items = Vec::new();

        if (1..=self.max_pages).contains(&page) {
            let offset = (page as usize - 1).saturating_mul(self.per_source);
            items.reserve(self.lanes.len() * self.per_source);
            for lane in &self.lanes {
                items.extend(lane.read(offset, self.per_source));
            }
        }

        FeedPage {
            items,
            page,
            max_pages: self.max_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stub::items;
    use crate::source::Platform;

    fn lane(platform: Platform, label: &str, n: usize) -> Arc<SourceCache> {
        let cache = Arc::new(SourceCache::new(label));
        cache.replace(items(platform, label, n));
        cache
    }

    fn paginator() -> FeedPaginator {
        FeedPaginator::new(
            vec![
                lane(Platform::Video, "video", 25),
                lane(Platform::Microblog, "microblog", 12),
                lane(Platform::Comment, "comments", 100),
            ],
            10,
            10,
        )
    }

    #[test]
    fn first_page_concatenates_lanes_in_declared_order() {
        let page = paginator().build_page(1);

        assert_eq!(page.page, 1);
        assert_eq!(page.max_pages, 10);
        assert_eq!(page.items.len(), 30);

        let platforms: Vec<_> = page.items.iter().map(|i| i.platform).collect();
        assert!(platforms[..10].iter().all(|p| *p == Platform::Video));
        assert!(platforms[10..20].iter().all(|p| *p == Platform::Microblog));
        assert!(platforms[20..].iter().all(|p| *p == Platform::Comment));
        assert_eq!(page.items[0].text, "video-0");
        assert_eq!(page.items[20].text, "comments-0");
    }

    #[test]
    fn later_pages_offset_every_lane_equally() {
        let page = paginator().build_page(2);

        let texts: Vec<_> = page.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts[0], "video-10");
        assert_eq!(texts[10], "microblog-10");
        assert_eq!(texts[11], "microblog-11");
        assert_eq!(texts[12], "comments-10");
        assert_eq!(page.items.len(), 10 + 2 + 10);
    }

    #[test]
    fn exhausted_lanes_contribute_nothing() {
        let page = paginator().build_page(3);

        assert!(page.items.iter().all(|i| i.platform != Platform::Microblog));
        assert_eq!(page.items.len(), 5 + 10);
    }

    #[test]
    fn pages_never_exceed_three_lanes_worth() {
        let paginator = paginator();
        for page in 1..=paginator.max_pages() {
            assert!(paginator.build_page(page).items.len() <= 3 * paginator.per_source());
        }
    }

    #[test]
    fn out_of_range_pages_are_empty_not_errors() {
        let paginator = paginator();
        assert!(paginator.build_page(0).items.is_empty());
        assert!(paginator.build_page(11).items.is_empty());
        assert!(paginator.build_page(u32::MAX).items.is_empty());
        assert_eq!(paginator.build_page(11).page, 11);
    }

    #[test]
    fn no_cross_lane_sorting() {
        let video = Arc::new(SourceCache::new("video"));
        let mut old = items(Platform::Video, "video", 1);
        old[0].timestamp = "2020-01-01T00:00:00Z".into();
        video.replace(old);

        let comments = Arc::new(SourceCache::new("comments"));
        let mut new = items(Platform::Comment, "comments", 1);
        new[0].timestamp = "2026-01-01T00:00:00Z".into();
        comments.replace(new);

        let page = FeedPaginator::new(vec![video, comments], 10, 10).build_page(1);
        assert_eq!(page.items[0].platform, Platform::Video, "lane order wins over recency");
    }
}
