use std::{collections::HashSet, sync::Arc, time::Duration};

use hnproxy::cache::{MemoryBackend, ResultCache};
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

// Installs a process-wide recorder, so this file holds a single test.
#[tokio::test]
async fn cache_access_emits_labelled_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = ResultCache::new(Arc::new(MemoryBackend::new(1)), Duration::from_secs(60));
    cache.set("post1", &json!({"id": 1})).await.expect("write");
    let _ = cache.get("post1").await;
    let _ = cache.get("post2").await;
    let _ = cache.set("post2", &json!({"id": 2})).await;

    let observed: HashSet<(String, Vec<String>)> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| {
            let key = composite_key.key();
            let labels = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            (key.name().to_string(), labels)
        })
        .collect();

    for name in [
        "hnproxy_cache_hit_total",
        "hnproxy_cache_miss_total",
        "hnproxy_cache_write_failure_total",
    ] {
        assert!(
            observed.contains(&(name.to_string(), vec!["backend=memory".to_string()])),
            "missing {name} in {observed:?}"
        );
    }
}
