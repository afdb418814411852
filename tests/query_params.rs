//! Query parameter routing through the registry and into cache keys.

use std::sync::Arc;
use std::time::Duration;

use time_fold_explorer::cache::DatasetCache;
use time_fold_explorer::datasets::ConfigStore;
use time_fold_explorer::loaders::{DatasetLoader, GeneratorLoader, LoaderRegistry};
use time_fold_explorer::query::resolve_params;

mod common;

use common::{CountingLoader, MemorySource, CONFIG_PATH};

#[test]
fn test_registry_prefixes_split_parameters() {
    let registry = LoaderRegistry::from_loaders([
        CountingLoader::prefixed("a") as Arc<dyn DatasetLoader>,
        CountingLoader::prefixed("b") as Arc<dyn DatasetLoader>,
    ])
    .unwrap();

    let resolved = resolve_params([("a_foo", "1"), ("b_bar", "2"), ("x_baz", "3")], &registry);

    assert_eq!(resolved.bucket_for(Some("a")).get("foo").map(String::as_str), Some("1"));
    assert_eq!(resolved.bucket_for(Some("b")).get("bar").map(String::as_str), Some("2"));
    assert_eq!(resolved.buckets.len(), 2);
    assert!(resolved.discarded.contains("x_baz"));
    assert!(resolved.primary.is_empty());
}

#[tokio::test]
async fn test_generator_params_key_the_cache() {
    let source = MemorySource::new();
    source.put(
        CONFIG_PATH,
        "[dummy]\npath = \"generated\"\nindex = \"ts\"\nloader = \"gen\"\n\
         loader_kwargs = { periods = 50 }\n",
    );
    let (store, _) = ConfigStore::open(CONFIG_PATH, source, Duration::from_secs(30)).await.unwrap();
    let registry =
        LoaderRegistry::from_loaders([Arc::new(GeneratorLoader) as Arc<dyn DatasetLoader>]).unwrap();
    let registry = Arc::new(registry);
    let cache = DatasetCache::new(Arc::new(store), registry.clone(), Duration::from_secs(3600));

    let seed_one = resolve_params([("gen_seed", "1"), ("step", "3")], &registry);
    let seed_one_again = resolve_params([("gen_seed", "1"), ("step", "9")], &registry);
    let seed_two = resolve_params([("gen_seed", "2")], &registry);

    let first = cache.lookup("dummy", &seed_one).await.unwrap();
    let again = cache.lookup("dummy", &seed_one_again).await.unwrap();
    let other = cache.lookup("dummy", &seed_two).await.unwrap();

    assert!(Arc::ptr_eq(&first, &again), "widget parameters do not key the cache");
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(first.payload.len(), 50);
    assert_ne!(first.payload, other.payload);
    assert_eq!(cache.entries_for("dummy").len(), 2);
}

#[tokio::test]
async fn test_generator_seed_variants_are_capped() {
    let source = MemorySource::new();
    source.put(
        CONFIG_PATH,
        "[dummy]\npath = \"generated\"\nindex = \"ts\"\nloader = \"gen\"\n\
         loader_kwargs = { periods = 10 }\n",
    );
    let (store, _) = ConfigStore::open(CONFIG_PATH, source, Duration::from_secs(30)).await.unwrap();
    let registry =
        LoaderRegistry::from_loaders([Arc::new(GeneratorLoader) as Arc<dyn DatasetLoader>]).unwrap();
    let registry = Arc::new(registry);
    let cache = DatasetCache::new(Arc::new(store), registry.clone(), Duration::from_secs(3600))
        .with_max_variants(4);

    let mut newest = None;
    for seed in 0..20 {
        let seed = seed.to_string();
        let params = resolve_params([("gen_seed", seed.as_str())], &registry);
        newest = Some(cache.lookup("dummy", &params).await.unwrap());
    }

    assert_eq!(cache.entries_for("dummy").len(), 4);
    let again = cache
        .lookup("dummy", &resolve_params([("gen_seed", "19")], &registry))
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&newest.unwrap(), &again));
}
