//! Demo catalog: groups, idols and the default data sources

use super::store::{RankingStore, StoreError};
use super::types::{NewDataSource, NewGroup, NewIdol, SourceKind};
use std::collections::HashMap;

// (name, company)
const GROUPS: [(&str, &str); 9] = [
    ("BTS", "HYBE"),
    ("BLACKPINK", "YG Entertainment"),
    ("TWICE", "JYP Entertainment"),
    ("SEVENTEEN", "PLEDIS Entertainment"),
    ("NewJeans", "ADOR"),
    ("IVE", "Starship Entertainment"),
    ("LE SSERAFIM", "Source Music"),
    ("aespa", "SM Entertainment"),
    ("Stray Kids", "JYP Entertainment"),
];

struct SeedIdol {
    name: &'static str,
    group: Option<&'static str>,
    real_name: Option<&'static str>,
    company: &'static str,
    gender: &'static str,
}

const fn act(name: &'static str, company: &'static str, gender: &'static str) -> SeedIdol {
    SeedIdol {
        name,
        group: Some(name),
        real_name: None,
        company,
        gender,
    }
}

const IDOLS: [SeedIdol; 10] = [
    act("BTS", "HYBE", "male"),
    act("BLACKPINK", "YG Entertainment", "female"),
    SeedIdol {
        name: "IU",
        group: None,
        real_name: Some("Lee Ji-eun"),
        company: "EDAM Entertainment",
        gender: "female",
    },
    act("TWICE", "JYP Entertainment", "female"),
    act("SEVENTEEN", "PLEDIS Entertainment", "male"),
    act("NewJeans", "ADOR", "female"),
    act("IVE", "Starship Entertainment", "female"),
    act("LE SSERAFIM", "Source Music", "female"),
    act("aespa", "SM Entertainment", "female"),
    act("Stray Kids", "JYP Entertainment", "male"),
];

// (name, kind, url)
const DATA_SOURCES: [(&str, SourceKind, &str); 8] = [
    ("YouTube Data API", SourceKind::Api, "https://developers.google.com/youtube/v3"),
    ("Spotify Web API", SourceKind::Api, "https://developer.spotify.com/documentation/web-api"),
    ("Instagram Graph API", SourceKind::Api, "https://developers.facebook.com/docs/instagram-basic-display-api"),
    ("Twitter API v2", SourceKind::Api, "https://developer.twitter.com/en/docs/twitter-api"),
    ("TikTok API", SourceKind::Api, "https://developers.tiktok.com/"),
    ("Chart Scraper", SourceKind::Scrape, "https://www.melon.com"),
    ("Brand Reputation Scraper", SourceKind::Scrape, "https://www.koreaboo.com"),
    ("Trend Analysis", SourceKind::Scrape, "https://trends.google.com"),
];

/// Seed the demo catalog into an empty database
///
/// Does nothing when any idol already exists. Returns the number of idols
/// created.
pub async fn seed_catalog(store: &dyn RankingStore) -> Result<usize, StoreError> {
    let existing = store.count_idols().await?;
    if existing > 0 {
        log::info!("⚠️  Database already contains {} idols, skipping seed", existing);
        return Ok(0);
    }

    let mut group_ids = HashMap::new();
    for (name, company) in GROUPS {
        let group = store
            .create_group(NewGroup {
                name: name.to_string(),
                company: Some(company.to_string()),
                is_active: true,
                ..Default::default()
            })
            .await?;
        group_ids.insert(name, group.id);
    }
    log::info!("   ├─ Created {} groups", group_ids.len());

    for seed in &IDOLS {
        let mut idol = NewIdol::named(seed.name);
        idol.group_id = seed.group.and_then(|g| group_ids.get(g).copied());
        idol.real_name = seed.real_name.map(str::to_string);
        idol.company = Some(seed.company.to_string());
        idol.gender = Some(seed.gender.to_string());
        idol.is_soloist = seed.group.is_none();
        store.create_idol(idol).await?;
    }
    log::info!("   ├─ Created {} idols", IDOLS.len());

    for (name, kind, url) in DATA_SOURCES {
        store
            .create_data_source(NewDataSource::new(name, kind).with_url(url))
            .await?;
    }
    log::info!("   └─ Created {} data sources", DATA_SOURCES.len());

    Ok(IDOLS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sources::{BuiltinSourceCatalog, SourceCatalog};
    use crate::pipeline::store::tests::create_test_store;
    use crate::pipeline::types::IdolFilter;

    #[tokio::test]
    async fn test_seed_once() {
        let (_temp, store) = create_test_store();

        assert_eq!(seed_catalog(&store).await.unwrap(), 10);
        assert_eq!(seed_catalog(&store).await.unwrap(), 0);

        let counts = store.platform_counts().await.unwrap();
        assert_eq!(counts.total_groups, 9);
        assert_eq!(counts.total_idols, 10);
        assert_eq!(counts.active_sources, 8);

        let iu = store.find_idol_by_name("IU").await.unwrap().unwrap();
        assert!(iu.is_soloist);
        assert!(iu.group_id.is_none());
        assert_eq!(iu.real_name.as_deref(), Some("Lee Ji-eun"));

        let jyp = store
            .list_idols(&IdolFilter {
                group: Some("Stray Kids".to_string()),
                gender: Some("male".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(jyp.len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_sources_all_resolve() {
        let (_temp, store) = create_test_store();
        seed_catalog(&store).await.unwrap();

        let catalog = BuiltinSourceCatalog::new().unwrap();
        for source in store.active_data_sources().await.unwrap() {
            assert!(catalog.resolve(&source).is_some(), "{}", source.name);
        }
    }
}
