//! End-to-end native library resolution: the provider chain built from
//! settings, a mock release API, archive verification and the ABI gate.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toka_conformance::{
    make_settings, release_archive, release_manifest, scripted_library, Layout, ScriptedLoader,
    TEST_REPO,
};
use toka_config::{env, EffectiveSettings, MapEnv};
use toka_native::{
    clear_library_cache, LibraryProvider, LibraryResolver, NativeError, Platform, ReleaseApi,
};
use toka_net::TransferClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, layout: &Layout, env: &MapEnv) -> EffectiveSettings {
    make_settings(layout, "http://hub.invalid", &server.uri(), env)
}

fn build(
    settings: &EffectiveSettings,
    loader: &ScriptedLoader,
) -> (LibraryResolver, Arc<TransferClient>) {
    let client = Arc::new(TransferClient::new(&settings.transfer).unwrap());
    let resolver = LibraryResolver::new(settings, Arc::clone(&client), Arc::new(loader.clone()));
    (resolver, client)
}

/// Mounts a release `tag` at `manifest_path` whose asset holds a library
/// reporting `version`. Returns the published digest.
async fn mount_release(
    server: &MockServer,
    manifest_path: &str,
    tag: &str,
    version: &str,
    digest_override: Option<&str>,
) -> String {
    let (archive, digest) = release_archive(version);
    let asset_path = format!("/download/{tag}/{}", Platform::current().asset_name());
    let url = format!("{}{asset_path}", server.uri());
    let published = digest_override.unwrap_or(&digest).to_string();
    Mock::given(method("GET"))
        .and(path(manifest_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(release_manifest(
            tag,
            &url,
            Some(&published),
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(asset_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(server)
        .await;
    published
}

fn latest_path() -> String {
    format!("/repos/{TEST_REPO}/releases/latest")
}

#[tokio::test]
async fn downloads_latest_then_reuses_cache() {
    let server = MockServer::start().await;
    mount_release(&server, &latest_path(), "v0.1.3", "0.1.3", None).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let settings = settings(&server, &layout, &MapEnv::new());
    let loader = ScriptedLoader::default();
    let cancel = CancellationToken::new();

    let (resolver, client) = build(&settings, &loader);
    let lib = resolver.resolve(&cancel).await.unwrap();
    assert_eq!(lib.provider(), "release download");
    assert_eq!(lib.version().to_string(), "0.1.3");
    assert_eq!(lib.path(), layout.cached_library());
    assert_eq!(client.user_agent(), "toka/0.1.3");

    let (again, _) = build(&settings, &loader);
    let lib = again.resolve(&cancel).await.unwrap();
    assert_eq!(lib.provider(), "cached library");
    assert_eq!(lib.path(), layout.cached_library());
}

#[tokio::test]
async fn pinned_version_uses_tag_manifest() {
    let server = MockServer::start().await;
    let manifest = format!("/repos/{TEST_REPO}/releases/tags/v0.1.1");
    mount_release(&server, &manifest, "v0.1.1", "0.1.1", None).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let env = MapEnv::new().with(env::TOKENIZERS_VERSION, "v0.1.1");
    let settings = settings(&server, &layout, &env);
    let (resolver, _) = build(&settings, &ScriptedLoader::default());

    let lib = resolver.resolve(&CancellationToken::new()).await.unwrap();
    assert_eq!(lib.version().to_string(), "0.1.1");
}

#[tokio::test]
async fn environment_path_wins_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let lib_path = dir.path().join("custom").join("libtokenizers.so");
    std::fs::create_dir_all(lib_path.parent().unwrap()).unwrap();
    std::fs::write(&lib_path, scripted_library("0.1.9")).unwrap();

    let env = MapEnv::new().with(env::TOKENIZERS_LIB_PATH, lib_path.to_string_lossy());
    let settings = settings(&server, &layout, &env);
    let (resolver, _) = build(&settings, &ScriptedLoader::default());
    assert!(matches!(
        resolver.providers().first(),
        Some(LibraryProvider::EnvironmentPath(p)) if p == &lib_path
    ));

    let lib = resolver.resolve(&CancellationToken::new()).await.unwrap();
    assert_eq!(lib.provider(), "TOKENIZERS_LIB_PATH");
    assert_eq!(lib.path(), lib_path);
}

#[tokio::test]
async fn missing_environment_path_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let missing = dir.path().join("nope.so");
    let env = MapEnv::new().with(env::TOKENIZERS_LIB_PATH, missing.to_string_lossy());
    let settings = settings(&server, &layout, &env);
    let (resolver, _) = build(&settings, &ScriptedLoader::default());

    let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
    match err {
        NativeError::NotFound { origin, path } => {
            assert_eq!(origin, "TOKENIZERS_LIB_PATH");
            assert_eq!(path, missing);
        }
        other => panic!("expected not found, got {other}"),
    }
}

#[tokio::test]
async fn incompatible_library_names_the_remedy() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let layout = Layout::new(dir.path());
    let lib_path = dir.path().join("libtokenizers.so");
    std::fs::write(&lib_path, scripted_library("0.2.0")).unwrap();

    let env = MapEnv::new().with(env::TOKENIZERS_LIB_PATH, lib_path.to_string_lossy());
    let settings = settings(&server, &layout, &env);
    let (resolver, client) = build(&settings, &ScriptedLoader::default());

    let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, NativeError::Incompatible { .. }), "{err}");
    let msg = err.to_string();
    assert!(msg.contains("0.2.0"), "{msg}");
    assert!(msg.contains("TOKENIZERS_LIB_PATH"), "{msg}");
    assert_eq!(client.user_agent(), "toka/0.1.0");
}

#[tokio::test]
async fn corrupt_cached_library_is_replaced() {
    let server = MockServer::start().await;
    mount_release(&server, &latest_path(), "v0.1.4", "0.1.4", None).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    std::fs::create_dir_all(layout.cached_library().parent().unwrap()).unwrap();
    std::fs::write(layout.cached_library(), b"\x7fELF truncated").unwrap();

    let settings = settings(&server, &layout, &MapEnv::new());
    let loader = ScriptedLoader::default();
    let (resolver, _) = build(&settings, &loader);

    let lib = resolver.resolve(&CancellationToken::new()).await.unwrap();
    assert_eq!(lib.provider(), "release download");
    assert_eq!(loader.loads(), 2);
    assert_eq!(
        std::fs::read_to_string(layout.cached_library()).unwrap(),
        scripted_library("0.1.4")
    );
}

#[tokio::test]
async fn digest_mismatch_installs_nothing() {
    let server = MockServer::start().await;
    let wrong = format!("sha256:{}", "0".repeat(64));
    mount_release(&server, &latest_path(), "v0.1.3", "0.1.3", Some(&wrong)).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let settings = settings(&server, &layout, &MapEnv::new());
    let loader = ScriptedLoader::default();
    let (resolver, _) = build(&settings, &loader);

    let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
    match err {
        NativeError::ChecksumMismatch { archive, .. } => {
            assert_eq!(archive, Platform::current().asset_name());
        }
        other => panic!("expected checksum mismatch, got {other}"),
    }
    assert!(!layout.cached_library().exists());
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn missing_platform_asset_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(latest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"tag_name":"v0.1.3","assets":[{"name":"libtokenizers-sparc-sun-solaris.tar.gz","browser_download_url":"http://x/y"}]}"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let settings = settings(&server, &layout, &MapEnv::new());
    let (resolver, _) = build(&settings, &ScriptedLoader::default());

    let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
    match err {
        NativeError::AssetNotFound { asset, tag } => {
            assert_eq!(asset, Platform::current().asset_name());
            assert_eq!(tag, "v0.1.3");
        }
        other => panic!("expected missing asset, got {other}"),
    }
}

#[tokio::test]
async fn offline_without_cache_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let env = MapEnv::new().with(env::HF_HUB_OFFLINE, "1");
    let settings = settings(&server, &layout, &env);
    let (resolver, _) = build(&settings, &ScriptedLoader::default());

    let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, NativeError::Offline), "{err}");
}

#[tokio::test]
async fn cleared_cache_forces_download() {
    let server = MockServer::start().await;
    mount_release(&server, &latest_path(), "v0.1.3", "0.1.3", None).await;

    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    std::fs::create_dir_all(layout.cached_library().parent().unwrap()).unwrap();
    std::fs::write(layout.cached_library(), scripted_library("0.1.0")).unwrap();

    assert!(clear_library_cache(&layout.cached_library()).unwrap());
    assert!(!clear_library_cache(&layout.cached_library()).unwrap());

    let settings = settings(&server, &layout, &MapEnv::new());
    let (resolver, _) = build(&settings, &ScriptedLoader::default());
    let lib = resolver.resolve(&CancellationToken::new()).await.unwrap();
    assert_eq!(lib.provider(), "release download");
    assert_eq!(lib.version().to_string(), "0.1.3");
}

#[tokio::test]
async fn lists_published_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{TEST_REPO}/releases")))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"tag_name":"v0.1.3","assets":[]},{"tag_name":"v0.1.2"},{"tag_name":"v0.1.1","assets":[]}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&server, &Layout::new(dir.path()), &MapEnv::new());
    let client = Arc::new(TransferClient::new(&settings.transfer).unwrap());
    let releases = ReleaseApi::new(client, &settings.library, &settings.transfer);

    let tags = releases.list_versions(&CancellationToken::new()).await.unwrap();
    assert_eq!(tags, ["v0.1.3", "v0.1.2", "v0.1.1"]);
}
