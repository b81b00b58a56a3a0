//! Expansion of a manifest into a flat list of downloads.
//!
//! Three independent expansions feed the list:
//!
//! 1. **Assets**: every object of the asset index. The index itself is
//!    loaded from `assets/indexes/<id>.json`, fetched and cached first if it
//!    is not there yet.
//! 2. **Libraries**: the primary artifact of each library admitted by its
//!    platform rules, plus the native classifier jar for the target platform.
//! 3. **Logging**: the client logging configuration, if declared.
//!
//! Only the asset expansion performs I/O. The result is deduplicated by
//! destination; asset objects that share a hash share a file.
//!
//! Paths and hashes taken from the manifest or the asset index must be plain
//! relative components; anything that could leave the working directory is
//! rejected with [`DownloadError::UnsafePath`].

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use super::item::Downloadable;
use crate::error::{DownloadError, DownloadResult};
use crate::io::{Fetcher, FileSystem};
use crate::manifest::{AssetIndex, PackageManifest};
use crate::platform::{platform_matcher, should_include, Platform};

/// Base URL asset objects are served from.
pub const RESOURCE_ENDPOINT: &str = "https://resources.download.minecraft.net";

/// Asset objects, laid out as `<prefix>/<hash>`.
pub const ASSET_OBJECTS_DIR: &str = "assets/objects";

/// Cached asset index documents, `<id>.json`.
pub const ASSET_INDEXES_DIR: &str = "assets/indexes";

/// Logging configuration files, `<id>`.
pub const LOG_CONFIGS_DIR: &str = "assets/log_configs";

/// Library jars, laid out by artifact path.
pub const LIBRARIES_DIR: &str = "libraries";

/// Turns a manifest into the list of files it requires.
pub struct ManifestResolver {
    fetcher: Arc<dyn Fetcher>,
    fs: Arc<dyn FileSystem>,
    working_dir: PathBuf,
    resource_endpoint: String,
}

impl ManifestResolver {
    /// Create a resolver laying files out under `working_dir`.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        fs: Arc<dyn FileSystem>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            fs,
            working_dir: working_dir.into(),
            resource_endpoint: RESOURCE_ENDPOINT.to_string(),
        }
    }

    /// Serve asset objects from another base URL.
    pub fn with_resource_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.resource_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn resource_endpoint(&self) -> &str {
        &self.resource_endpoint
    }

    /// Local path of the manifest's asset index document.
    pub fn asset_index_path(&self, manifest: &PackageManifest) -> DownloadResult<PathBuf> {
        join_relative(
            &self.working_dir.join(ASSET_INDEXES_DIR),
            &manifest.asset_index.id,
            &format!("{}.json", manifest.asset_index.id),
        )
    }

    /// Expand `manifest` for `platform`.
    ///
    /// Items come out grouped as assets, libraries, then logging, with
    /// duplicate destinations removed (first occurrence kept).
    pub async fn resolve(
        &self,
        manifest: &PackageManifest,
        platform: Platform,
    ) -> DownloadResult<Vec<Downloadable>> {
        let (mut items, libraries, logging) = tokio::try_join!(
            self.resolve_assets(manifest),
            async { self.resolve_libraries(manifest, platform) },
            async { self.resolve_logging(manifest) },
        )?;
        let asset_count = items.len();
        items.extend(libraries);
        items.extend(logging);

        let before = items.len();
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.destination().to_path_buf()));

        debug!(
            manifest = %manifest.id,
            assets = asset_count,
            total = items.len(),
            duplicates = before - items.len(),
            "Resolved manifest"
        );

        Ok(items)
    }

    /// Asset objects of the manifest's asset index.
    pub async fn resolve_assets(
        &self,
        manifest: &PackageManifest,
    ) -> DownloadResult<Vec<Downloadable>> {
        let index = self.load_asset_index(manifest).await?;
        let objects_dir = self.working_dir.join(ASSET_OBJECTS_DIR);

        index
            .objects
            .iter()
            .map(|(name, object)| -> DownloadResult<Downloadable> {
                let prefix = hash_prefix(name, &object.hash)?;

                Ok(Downloadable::new(
                    name.as_str(),
                    format!("{}/{}/{}", self.resource_endpoint, prefix, object.hash),
                    objects_dir.join(prefix).join(&object.hash),
                ))
            })
            .collect()
    }

    /// Library artifacts admitted on `platform`, with their native jars.
    pub fn resolve_libraries(
        &self,
        manifest: &PackageManifest,
        platform: Platform,
    ) -> DownloadResult<Vec<Downloadable>> {
        let is_match = platform_matcher(platform);
        let classifier = platform.native_classifier_key();
        let libraries_dir = self.working_dir.join(LIBRARIES_DIR);
        let mut items = Vec::new();

        for library in &manifest.libraries {
            if !should_include(library.rules.as_deref(), &is_match) {
                debug!(library = %library.name, %platform, "Library excluded by rules");
                continue;
            }

            if let Some(artifact) = &library.downloads.artifact {
                items.push(Downloadable::new(
                    library.name.as_str(),
                    artifact.url.as_str(),
                    join_relative(&libraries_dir, &library.name, &artifact.path)?,
                ));
            }

            let native = library
                .downloads
                .classifiers
                .as_ref()
                .and_then(|classifiers| classifiers.get(classifier));
            if let Some(native) = native {
                let name = format!("{}:{}", library.name, classifier);
                let destination = join_relative(&libraries_dir, &name, &native.path)?;
                items.push(Downloadable::new(name, native.url.as_str(), destination));
            }
        }

        Ok(items)
    }

    /// The client logging configuration, if the manifest declares one.
    pub fn resolve_logging(
        &self,
        manifest: &PackageManifest,
    ) -> DownloadResult<Option<Downloadable>> {
        let Some(client) = manifest.logging.as_ref().and_then(|l| l.client.as_ref()) else {
            return Ok(None);
        };
        let file = &client.file;
        let logs_dir = self.working_dir.join(LOG_CONFIGS_DIR);
        let destination = join_relative(&logs_dir, &file.id, &file.id)?;
        Ok(Some(Downloadable::new(
            file.id.as_str(),
            file.url.as_str(),
            destination,
        )))
    }

    /// Load the asset index, fetching and caching it when absent.
    ///
    /// A fetched document is parsed before it is persisted, so a malformed
    /// response is never cached.
    async fn load_asset_index(&self, manifest: &PackageManifest) -> DownloadResult<AssetIndex> {
        let path = self.asset_index_path(manifest)?;

        let cached = self
            .fs
            .exists(&path)
            .await
            .map_err(|source| DownloadError::ProbeFailed {
                path: path.clone(),
                source,
            })?;

        if cached {
            debug!(path = %path.display(), "Using cached asset index");
            let text = self
                .fs
                .read_to_string(&path)
                .await
                .map_err(|source| DownloadError::ReadFailed {
                    path: path.clone(),
                    source,
                })?;
            return serde_json::from_str(&text)
                .map_err(|source| DownloadError::IndexParse { path, source });
        }

        let url = manifest.asset_index.url.as_str();
        info!(id = %manifest.asset_index.id, url, "Fetching asset index");

        let response = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| DownloadError::FetchFailed {
                url: url.to_string(),
                reason: e.reason,
            })?;
        if !response.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let text = response.text().map_err(|e| DownloadError::FetchFailed {
            url: url.to_string(),
            reason: e.reason,
        })?;
        let index: AssetIndex =
            serde_json::from_str(&text).map_err(|source| DownloadError::IndexParse {
                path: path.clone(),
                source,
            })?;

        self.fs
            .write(&path, Bytes::from(text))
            .await
            .map_err(|source| DownloadError::WriteFailed { path, source })?;

        Ok(index)
    }
}

/// Join `relative` below `base`, accepting only plain path components.
fn join_relative(base: &Path, name: &str, relative: &str) -> DownloadResult<PathBuf> {
    let path = Path::new(relative);
    let plain = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let named = path.components().any(|c| matches!(c, Component::Normal(_)));
    if !plain || !named {
        return Err(DownloadError::UnsafePath {
            name: name.to_string(),
            path: relative.to_string(),
        });
    }
    Ok(base.join(path))
}

/// First two characters of an object hash, which must be hexadecimal.
fn hash_prefix<'a>(name: &str, hash: &'a str) -> DownloadResult<&'a str> {
    if hash.len() < 2 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DownloadError::InvalidAssetHash {
            name: name.to_string(),
            hash: hash.to_string(),
        });
    }
    Ok(&hash[..2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FetchResponse, MemoryFetcher, MemoryFileSystem};
    use crate::manifest::{Artifact, AssetIndexRef, Library, LibraryDownloads};
    use crate::platform::{Rule, RuleAction};
    use std::collections::HashMap;

    const WORK: &str = "/work";
    const INDEX_URL: &str = "https://meta.example.com/indexes/1.17.json";

    fn manifest() -> PackageManifest {
        PackageManifest {
            id: "1.17.1".to_string(),
            asset_index: AssetIndexRef {
                id: "1.17".to_string(),
                url: INDEX_URL.to_string(),
                sha1: None,
                size: None,
                total_size: None,
            },
            libraries: Vec::new(),
            logging: None,
        }
    }

    fn artifact(path: &str) -> Artifact {
        Artifact {
            path: path.to_string(),
            url: format!("https://libraries.example.com/{}", path),
            sha1: None,
            size: None,
        }
    }

    fn setup() -> (Arc<MemoryFetcher>, Arc<MemoryFileSystem>, ManifestResolver) {
        let fetcher = Arc::new(MemoryFetcher::new());
        let fs = Arc::new(MemoryFileSystem::new());
        let resolver = ManifestResolver::new(fetcher.clone(), fs.clone(), WORK);
        (fetcher, fs, resolver)
    }

    const ONE_ASSET: &str = r#"{"objects": {"minecraft/sounds/a.ogg": {"hash": "abcdef1234567890", "size": 3}}}"#;

    #[tokio::test]
    async fn test_cached_index_is_not_fetched() {
        let (fetcher, fs, resolver) = setup();
        fs.insert("/work/assets/indexes/1.17.json", ONE_ASSET);

        let items = resolver.resolve(&manifest(), Platform::Linux).await.unwrap();

        assert!(fetcher.requests().is_empty());
        assert_eq!(
            items,
            vec![Downloadable::new(
                "minecraft/sounds/a.ogg",
                format!("{}/ab/abcdef1234567890", RESOURCE_ENDPOINT),
                "/work/assets/objects/ab/abcdef1234567890",
            )]
        );
    }

    #[tokio::test]
    async fn test_missing_index_is_fetched_and_persisted_verbatim() {
        let (fetcher, fs, resolver) = setup();
        fetcher.insert(INDEX_URL, ONE_ASSET);

        let items = resolver.resolve_assets(&manifest()).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(fetcher.requests(), vec![INDEX_URL]);
        let cached = fs
            .get(Path::new("/work/assets/indexes/1.17.json"))
            .unwrap();
        assert_eq!(cached, Bytes::from_static(ONE_ASSET.as_bytes()));
    }

    #[tokio::test]
    async fn test_index_http_error() {
        let (fetcher, fs, resolver) = setup();
        fetcher.insert_response(INDEX_URL, FetchResponse::new(503, ""));

        let err = resolver.resolve(&manifest(), Platform::Linux).await.unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 503, .. }));
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_index_transport_error() {
        let (fetcher, _fs, resolver) = setup();
        fetcher.break_url(INDEX_URL);

        let err = resolver.resolve_assets(&manifest()).await.unwrap_err();

        assert!(err.is_fetch_failure());
    }

    #[tokio::test]
    async fn test_malformed_fetched_index_is_not_cached() {
        let (fetcher, fs, resolver) = setup();
        fetcher.insert(INDEX_URL, "not json");

        let err = resolver.resolve_assets(&manifest()).await.unwrap_err();

        assert!(matches!(err, DownloadError::IndexParse { .. }));
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_short_hash_is_rejected() {
        let (_fetcher, fs, resolver) = setup();
        fs.insert(
            "/work/assets/indexes/1.17.json",
            r#"{"objects": {"x": {"hash": "a", "size": 1}}}"#,
        );

        let err = resolver.resolve_assets(&manifest()).await.unwrap_err();

        assert!(matches!(err, DownloadError::InvalidAssetHash { .. }));
    }

    #[tokio::test]
    async fn test_shared_hashes_are_deduplicated() {
        let (_fetcher, fs, resolver) = setup();
        fs.insert(
            "/work/assets/indexes/1.17.json",
            r#"{"objects": {
                "a.png": {"hash": "ff00aa", "size": 1},
                "b.png": {"hash": "ff00aa", "size": 1},
                "c.png": {"hash": "0011bb", "size": 1}
            }}"#,
        );

        let items = resolver.resolve(&manifest(), Platform::Linux).await.unwrap();

        let names: Vec<_> = items.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn test_libraries_follow_rules_and_classifiers() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        manifest.libraries = vec![
            Library {
                name: "com.example:core:1.0".to_string(),
                downloads: LibraryDownloads {
                    artifact: Some(artifact("com/example/core-1.0.jar")),
                    classifiers: None,
                },
                rules: Some(vec![Rule::for_os(RuleAction::Disallow, "windows")]),
            },
            Library {
                name: "org.lwjgl:lwjgl:3.2.2".to_string(),
                downloads: LibraryDownloads {
                    artifact: Some(artifact("org/lwjgl/lwjgl-3.2.2.jar")),
                    classifiers: Some(HashMap::from([
                        (
                            "natives-macos".to_string(),
                            artifact("org/lwjgl/lwjgl-3.2.2-natives-macos.jar"),
                        ),
                        (
                            "natives-linux".to_string(),
                            artifact("org/lwjgl/lwjgl-3.2.2-natives-linux.jar"),
                        ),
                    ])),
                },
                rules: None,
            },
            Library {
                name: "ca.weblite:java-objc-bridge:1.0".to_string(),
                downloads: LibraryDownloads {
                    artifact: Some(artifact("ca/weblite/java-objc-bridge-1.0.jar")),
                    classifiers: None,
                },
                rules: Some(vec![Rule::for_os(RuleAction::Allow, "osx")]),
            },
        ];

        let darwin = resolver.resolve_libraries(&manifest, Platform::Darwin).unwrap();
        let darwin: Vec<_> = darwin.iter().map(|i| i.name().to_string()).collect();
        assert_eq!(
            darwin,
            vec![
                "com.example:core:1.0",
                "org.lwjgl:lwjgl:3.2.2",
                "org.lwjgl:lwjgl:3.2.2:natives-macos",
                "ca.weblite:java-objc-bridge:1.0",
            ]
        );

        let windows = resolver.resolve_libraries(&manifest, Platform::Win32).unwrap();
        let windows: Vec<_> = windows.iter().map(|i| i.name().to_string()).collect();
        assert_eq!(windows, vec!["org.lwjgl:lwjgl:3.2.2"]);

        let linux = resolver.resolve_libraries(&manifest, Platform::Linux).unwrap();
        assert_eq!(
            linux[2].destination(),
            Path::new("/work/libraries/org/lwjgl/lwjgl-3.2.2-natives-linux.jar")
        );
    }

    #[test]
    fn test_library_without_artifact_only_yields_native() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        manifest.libraries = vec![Library {
            name: "org.example:natives-only:1.0".to_string(),
            downloads: LibraryDownloads {
                artifact: None,
                classifiers: Some(HashMap::from([(
                    "natives-windows".to_string(),
                    artifact("org/example/natives-only-1.0-natives-windows.jar"),
                )])),
            },
            rules: None,
        }];

        assert!(resolver
            .resolve_libraries(&manifest, Platform::Linux)
            .unwrap()
            .is_empty());
        assert_eq!(
            resolver
                .resolve_libraries(&manifest, Platform::Win32)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_logging_config_item() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        assert!(resolver.resolve_logging(&manifest).unwrap().is_none());

        manifest.logging = serde_json::from_str(
            r#"{"client": {"file": {"id": "client-1.12.xml", "url": "https://example.com/client-1.12.xml"}}}"#,
        )
        .unwrap();

        let item = resolver.resolve_logging(&manifest).unwrap().unwrap();
        assert_eq!(item.name(), "client-1.12.xml");
        assert_eq!(item.url(), "https://example.com/client-1.12.xml");
        assert_eq!(
            item.destination(),
            Path::new("/work/assets/log_configs/client-1.12.xml")
        );
    }

    #[tokio::test]
    async fn test_custom_resource_endpoint() {
        let (_fetcher, fs, resolver) = setup();
        let resolver = resolver.with_resource_endpoint("http://mirror.local/objects/");
        fs.insert("/work/assets/indexes/1.17.json", ONE_ASSET);

        let items = resolver.resolve_assets(&manifest()).await.unwrap();

        assert_eq!(
            items[0].url(),
            "http://mirror.local/objects/ab/abcdef1234567890"
        );
    }

    fn library(name: &str, artifact_path: &str) -> Library {
        Library {
            name: name.to_string(),
            downloads: LibraryDownloads {
                artifact: Some(artifact(artifact_path)),
                classifiers: None,
            },
            rules: None,
        }
    }

    #[test]
    fn test_absolute_library_path_is_rejected() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        manifest.libraries = vec![library("com.example:evil:1.0", "/etc/cron.d/evil")];

        let err = resolver
            .resolve_libraries(&manifest, Platform::Linux)
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::UnsafePath { ref name, ref path }
                if name == "com.example:evil:1.0" && path == "/etc/cron.d/evil"
        ));
    }

    #[test]
    fn test_parent_dir_in_native_path_is_rejected() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        manifest.libraries = vec![Library {
            name: "org.lwjgl:lwjgl:3.2.2".to_string(),
            downloads: LibraryDownloads {
                artifact: None,
                classifiers: Some(HashMap::from([(
                    "natives-linux".to_string(),
                    artifact("org/../../../home/user/.bashrc"),
                )])),
            },
            rules: None,
        }];

        let err = resolver
            .resolve_libraries(&manifest, Platform::Linux)
            .unwrap_err();

        assert!(matches!(err, DownloadError::UnsafePath { .. }));
    }

    #[test]
    fn test_unsafe_logging_id_is_rejected() {
        let (_fetcher, _fs, resolver) = setup();
        let mut manifest = manifest();
        for id in ["/root/.bashrc", "../client.xml", ".", ""] {
            manifest.logging = serde_json::from_str(&format!(
                r#"{{"client": {{"file": {{"id": "{}", "url": "https://example.com/x"}}}}}}"#,
                id
            ))
            .unwrap();

            assert!(
                matches!(
                    resolver.resolve_logging(&manifest),
                    Err(DownloadError::UnsafePath { .. })
                ),
                "id {:?} accepted",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_unsafe_index_id_is_rejected_before_io() {
        let (fetcher, fs, resolver) = setup();
        let mut manifest = manifest();
        manifest.asset_index.id = "../../etc/passwd".to_string();
        fetcher.insert(INDEX_URL, ONE_ASSET);

        let err = resolver.resolve(&manifest, Platform::Linux).await.unwrap_err();

        assert!(matches!(err, DownloadError::UnsafePath { .. }));
        assert!(fetcher.requests().is_empty());
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_non_hex_hash_is_rejected() {
        let (_fetcher, fs, resolver) = setup();
        fs.insert(
            "/work/assets/indexes/1.17.json",
            r#"{"objects": {"evil": {"hash": "ab/../../../../etc/evil", "size": 1}}}"#,
        );

        let err = resolver.resolve_assets(&manifest()).await.unwrap_err();

        assert!(matches!(
            err,
            DownloadError::InvalidAssetHash { ref name, .. } if name == "evil"
        ));
    }

    #[test]
    fn test_join_relative_keeps_plain_paths() {
        let joined = join_relative(Path::new("/work/libraries"), "x", "./org/x.jar").unwrap();
        assert_eq!(joined, Path::new("/work/libraries/org/x.jar"));
    }
}
