use std::time::Duration;

use memorace::config::MemoizerConfig;
use memorace::store::FilesystemStore;
use memorace::{CacheKey, RaceMemoizer, Source};
use memorace_test::EchoComputation;
use serde_json::json;

use crate::{millis, test};

#[tokio::test]
async fn test_filesystem_cache() {
    test::setup();
    let cache_dir = test::tempdir();

    let config = MemoizerConfig {
        deadline: Duration::from_secs(5),
    };
    let memoizer = RaceMemoizer::with_config(
        EchoComputation::new("slow_function", millis(500..=500)),
        FilesystemStore::new(cache_dir.path()),
        &config,
    );

    let invocation = memoizer.invoke(json!({"hi": "there"})).await;
    assert_eq!(invocation.result.unwrap().source, Source::Computation);
    invocation.refreshed.await.unwrap();

    let path = memoizer
        .store()
        .entry_path(&CacheKey::from_name("slow_function"));
    let contents = std::fs::read_to_string(path).unwrap();
    assert_eq!(contents, r#"{"hi":"there"}"#);

    // a fresh memoizer on the same directory picks the entry up
    let memoizer = RaceMemoizer::new(
        EchoComputation::new("slow_function", millis(500..=500)),
        FilesystemStore::new(cache_dir.path()),
    );
    let invocation = memoizer.invoke(json!({"ho": "hey"})).await;
    let delivered = invocation.result.unwrap();
    assert_eq!(delivered.source, Source::Cache);
    assert_eq!(delivered.value, json!({"hi": "there"}));

    invocation.refreshed.await.unwrap();
    let contents = std::fs::read_to_string(
        memoizer
            .store()
            .entry_path(&CacheKey::from_name("slow_function")),
    )
    .unwrap();
    assert_eq!(contents, r#"{"ho":"hey"}"#);
}
