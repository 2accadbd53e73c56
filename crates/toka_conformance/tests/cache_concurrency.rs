//! Concurrent use of the primary cache: racing resolutions of one key and
//! readers observing a writer that keeps replacing an entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toka_cache::{Lookup, ModelHub, PrimaryCache};
use toka_common::{AssetKey, ModelId, Revision, Ttl};
use toka_conformance::{make_settings, tokenizer_json, Layout};
use toka_config::MapEnv;
use toka_net::TransferClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_resolutions_of_one_key_agree() {
    let server = MockServer::start().await;
    let body = tokenizer_json("shared");
    Mock::given(method("GET"))
        .and(path("/acme/shared/resolve/main/tokenizer.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let settings = make_settings(&layout, &server.uri(), "http://api.invalid", &MapEnv::new());
    let client = Arc::new(TransferClient::new(&settings.transfer).unwrap());
    let hub = Arc::new(ModelHub::new(client, &settings));
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let hub = Arc::clone(&hub);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            hub.fetch_tokenizer("acme/shared", None, &cancel).await
        }));
    }
    for task in tasks {
        let resolved = task.await.unwrap().unwrap();
        assert_eq!(resolved.bytes, body.as_bytes());
    }

    let entry = layout.primary_entry("acme/shared", "main");
    assert_eq!(std::fs::read_to_string(&entry).unwrap(), body);
    let leftovers: Vec<_> = std::fs::read_dir(entry.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|name| name != "tokenizer.json")
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn readers_never_see_a_partial_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PrimaryCache::new(dir.path());
    let key = AssetKey::model(ModelId::parse("acme/churn").unwrap(), Revision::default());

    // Documents of different lengths so a torn write would not parse.
    let small = tokenizer_json("a");
    let large = tokenizer_json(&"b".repeat(64 * 1024));
    cache.store(&key, small.as_bytes()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for i in 0..200 {
                let doc = if i % 2 == 0 { &large } else { &small };
                cache.store(&key, doc.as_bytes()).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..4 {
            scope.spawn(|| {
                let mut hits = 0u32;
                while !done.load(Ordering::SeqCst) || hits == 0 {
                    match cache.lookup(&key, Ttl::Forever).unwrap() {
                        Lookup::Hit(bytes) => {
                            assert!(bytes == small.as_bytes() || bytes == large.as_bytes());
                            hits += 1;
                        }
                        Lookup::Miss(reason) => panic!("entry vanished: {reason:?}"),
                    }
                }
            });
        }

        writer.join().unwrap();
    });
}

#[test]
fn clearing_while_another_model_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let cache = PrimaryCache::new(dir.path());
    let keep = AssetKey::model(ModelId::parse("keep/model").unwrap(), Revision::default());
    let doc = tokenizer_json("keep");

    for i in 0..8 {
        let key = AssetKey::model(
            ModelId::parse(&format!("drop/model-{i}")).unwrap(),
            Revision::default(),
        );
        cache.store(&key, doc.as_bytes()).unwrap();
    }

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                cache.store(&keep, doc.as_bytes()).unwrap();
            }
        });
        scope.spawn(|| {
            assert_eq!(cache.clear_matching("drop/*").unwrap(), 8);
        });
    });

    assert!(matches!(cache.lookup(&keep, Ttl::Forever).unwrap(), Lookup::Hit(_)));
    let info = cache.info(&ModelId::parse("drop/model-3").unwrap()).unwrap();
    assert!(!info.cached);
}
