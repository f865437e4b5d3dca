use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rss::{Category, Guid, Item};
use serde::Serialize;
use uuid::Uuid;

use super::variant::Variant;

/// Everything needed to publish a story except its identity.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemDraft {
    pub date: DateTime<Utc>,
    pub variant: Variant,
    pub title: String,
    pub description: String,
    /// Template values in placeholder order.
    pub fields: Vec<String>,
}

/// One entry of the feed manifest. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublishedItem {
    pub id: String,
    pub date: DateTime<Utc>,
    pub variant: Variant,
    pub title: String,
    pub description: String,
    /// Rendered file, relative to the document root.
    pub file_name: String,
}

impl PublishedItem {
    pub fn link(&self, url_root: &str) -> String { format!("{}{}", url_root, self.file_name) }

    pub fn rendered_path(&self, doc_root: &Path) -> PathBuf { doc_root.join(&self.file_name) }

    pub fn to_rss(&self, url_root: &str) -> Item {
        let link = self.link(url_root);
        let mut guid = Guid::default();
        guid.set_value(link.clone());
        guid.set_permalink(true);
        let mut category = Category::default();
        category.set_name(self.variant.code());

        let mut item = Item::default();
        item.set_guid(guid);
        item.set_title(self.title.clone());
        item.set_description(self.description.clone());
        item.set_link(link);
        item.set_pub_date(self.date.to_rfc2822());
        item.set_categories(vec![category]);
        item
    }

    /// Rebuild from a manifest entry. Entries with neither link nor guid are unusable.
    pub fn from_rss(item: &Item) -> Option<Self> {
        let link = item.link().or_else(|| item.guid().map(|g| g.value()))?;
        let file_name = link.rsplit('/').next().filter(|s| !s.is_empty())?.to_string();
        let id = file_name.strip_suffix(".html").unwrap_or(&file_name).to_string();
        let date = item
            .pub_date()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();
        let variant = item
            .categories()
            .iter()
            .find_map(|c| c.name().parse::<Variant>().ok())
            .unwrap_or(Variant::EnOnly);

        Some(PublishedItem {
            id,
            date,
            variant,
            title: item.title().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            file_name,
        })
    }
}

/// Item id: creation time to the microsecond plus a random suffix.
pub fn item_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{:06}_{}", now.timestamp(), now.timestamp_subsec_micros(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> PublishedItem {
        PublishedItem {
            id: "1577836800_000000_abcdef01".into(),
            date: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            variant: Variant::CnhEnb,
            title: "Title".into(),
            description: "Body".into(),
            file_name: "1577836800_000000_abcdef01.html".into(),
        }
    }

    #[test]
    fn rss_item_round_trips() {
        let item = sample().to_rss("http://h/rss/");
        assert_eq!(item.link(), Some("http://h/rss/1577836800_000000_abcdef01.html"));
        assert_eq!(item.guid().unwrap().value(), "http://h/rss/1577836800_000000_abcdef01.html");
        assert_eq!(item.categories()[0].name(), "CNH_ENB");
        assert_eq!(PublishedItem::from_rss(&item), Some(sample()));
    }

    #[test]
    fn from_rss_needs_a_link_or_guid() {
        assert!(PublishedItem::from_rss(&Item::default()).is_none());
    }

    #[test]
    fn foreign_entries_default_to_en_only() {
        let mut item = Item::default();
        item.set_link("http://h/rss/legacy_42.html".to_string());
        let got = PublishedItem::from_rss(&item).unwrap();
        assert_eq!(got.id, "legacy_42");
        assert_eq!(got.variant, Variant::EnOnly);
    }

    #[test]
    fn ids_are_time_prefixed_and_distinct() {
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let a = item_id(now);
        let b = item_id(now);
        assert!(a.starts_with("1577836800_000000_"));
        assert_eq!(a.len(), "1577836800_000000_".len() + 8);
        assert_ne!(a, b);
    }
}
