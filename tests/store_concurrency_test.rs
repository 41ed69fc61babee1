use apichain::chain::{ExtractRule, RequestChain};
use apichain::definition::RequestDefinition;
use apichain::http::Method;
use apichain::metrics::{MetricsStorage, PerformanceMetric};
use apichain::store::{JsonFileStore, RecordStore};
use std::collections::HashSet;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_puts_keep_every_record() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("requests.json");

    let thread_count = 8;
    let records_per_thread = 25;

    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let path = path.clone();
            // Each thread opens its own store, like separate processes would
            thread::spawn(move || {
                let store: JsonFileStore<RequestDefinition> = JsonFileStore::new(path);
                for j in 0..records_per_thread {
                    let name = format!("req-{}-{}", i, j);
                    let url = format!("https://example.com/{}", name);
                    store
                        .put(RequestDefinition::new(name, Method::Get, url))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let store: JsonFileStore<RequestDefinition> = JsonFileStore::new(path);
    let names: HashSet<_> = store.list().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names.len(), thread_count * records_per_thread);
    assert!(names.contains("req-7-24"));
}

#[test]
fn test_same_name_is_last_write_wins() {
    let temp_dir = TempDir::new().unwrap();
    let store: JsonFileStore<RequestChain> = JsonFileStore::in_dir(temp_dir.path(), "chains.json");

    store
        .put(RequestChain::new("flow", vec!["a".into()], vec![]))
        .unwrap();
    store
        .put(RequestChain::new(
            "flow",
            vec!["a".into(), "b".into()],
            vec![ExtractRule::new(0, "id", "uid")],
        ))
        .unwrap();

    let chains = store.list().unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].requests.len(), 2);
}

#[test]
fn test_concurrent_metric_appends() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();

    let thread_count = 10;
    let entries_per_thread = 50;

    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let dir = dir.clone();
            thread::spawn(move || {
                let storage = MetricsStorage::in_dir(&dir);
                for j in 0..entries_per_thread {
                    let metric = PerformanceMetric::new(format!("req-{}", i), 200, j as f64 / 1000.0);
                    storage.append(&metric).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let log = MetricsStorage::in_dir(&dir).load().unwrap();
    assert_eq!(log.len(), thread_count * entries_per_thread);
    assert_eq!(log.stats(Some("req-3")).count, entries_per_thread);
}
