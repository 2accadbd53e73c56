//! Ordered fallback chain that produces a loaded, ABI-checked library.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use semver::Version;
use tokio_util::sync::CancellationToken;
use toka_common::Sha256Digest;
use toka_config::EffectiveSettings;
use toka_net::TransferClient;
use tracing::{debug, info, warn};

use crate::abi::AbiGate;
use crate::archive::ArchiveExtractor;
use crate::error::NativeError;
use crate::loader::{LibraryLoader, NativeModule};
use crate::maintenance::cached_library_path;
use crate::platform::Platform;
use crate::release::ReleaseApi;

/// A loaded library that passed the ABI gate.
#[derive(Debug)]
pub struct NativeLibrary {
    module: Box<dyn NativeModule>,
    version: Version,
    provider: &'static str,
}

impl NativeLibrary {
    /// File the library was loaded from.
    pub fn path(&self) -> &Path {
        self.module.path()
    }

    /// Version the library reported.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Name of the provider that produced the library.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// The underlying module.
    pub fn module(&self) -> &dyn NativeModule {
        self.module.as_ref()
    }
}

/// Outcome of one provider that did not abort the chain.
#[derive(Debug)]
pub enum Provided {
    /// A module was loaded.
    Ready(Box<dyn NativeModule>),
    /// This provider has nothing; try the next one.
    Next(String),
}

/// One step of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryProvider {
    /// A path given in configuration or on the command line.
    ExplicitPath(PathBuf),
    /// A path from `TOKENIZERS_LIB_PATH`.
    EnvironmentPath(PathBuf),
    /// A previously downloaded library.
    CachedArtifact(PathBuf),
    /// Download the release build for this platform into the cache path.
    RemoteArtifact {
        /// Release tag or `latest`.
        tag: String,
        /// Where the library is extracted.
        dest: PathBuf,
    },
}

impl LibraryProvider {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            LibraryProvider::ExplicitPath(_) => "explicit path",
            LibraryProvider::EnvironmentPath(_) => "TOKENIZERS_LIB_PATH",
            LibraryProvider::CachedArtifact(_) => "cached library",
            LibraryProvider::RemoteArtifact { .. } => "release download",
        }
    }

    async fn provide(
        &self,
        ctx: &ResolveContext,
        cancel: &CancellationToken,
    ) -> Result<Provided, NativeError> {
        match self {
            LibraryProvider::ExplicitPath(path) | LibraryProvider::EnvironmentPath(path) => {
                if !path.exists() {
                    return Err(NativeError::NotFound {
                        origin: self.name(),
                        path: path.clone(),
                    });
                }
                ctx.loader.load(path, self.name()).map(Provided::Ready)
            }
            LibraryProvider::CachedArtifact(path) => {
                if !path.exists() {
                    return Ok(Provided::Next(format!(
                        "no cached library at {}",
                        path.display()
                    )));
                }
                match ctx.loader.load(path, self.name()) {
                    Ok(module) => Ok(Provided::Ready(module)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "cached library failed to load, removing it");
                        if let Err(rm) = std::fs::remove_file(path) {
                            warn!(path = %path.display(), error = %rm, "failed to remove cached library");
                        }
                        Ok(Provided::Next(format!("cached library unusable: {e}")))
                    }
                }
            }
            LibraryProvider::RemoteArtifact { tag, dest } => {
                if ctx.offline {
                    return Err(NativeError::Offline);
                }
                let manifest = ctx.releases.manifest(tag, cancel).await?;
                let asset_name = ctx.platform.asset_name();
                let asset = manifest.asset(&asset_name)?;
                let expected = asset
                    .digest
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .map(Sha256Digest::from_str)
                    .transpose()
                    .map_err(|source| NativeError::InvalidDigest {
                        archive: asset.name.clone(),
                        source,
                    })?;
                if expected.is_none() {
                    warn!(asset = %asset.name, "release asset has no published digest, skipping verification");
                }

                info!(tag = %manifest.tag, asset = %asset.name, "downloading native library");
                let archive = ctx.releases.download(asset, cancel).await?;
                ArchiveExtractor::new(ctx.platform.library_file_name()).verify_and_extract(
                    &asset.name,
                    &archive,
                    expected.as_ref(),
                    dest,
                )?;
                ctx.loader.load(dest, self.name()).map(Provided::Ready)
            }
        }
    }
}

impl fmt::Display for LibraryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryProvider::ExplicitPath(p)
            | LibraryProvider::EnvironmentPath(p)
            | LibraryProvider::CachedArtifact(p) => write!(f, "{} ({})", self.name(), p.display()),
            LibraryProvider::RemoteArtifact { tag, .. } => write!(f, "{} ({tag})", self.name()),
        }
    }
}

#[derive(Debug)]
struct ResolveContext {
    loader: Arc<dyn LibraryLoader>,
    releases: ReleaseApi,
    platform: Platform,
    offline: bool,
}

/// Walks the provider chain and gates the result.
#[derive(Debug)]
pub struct LibraryResolver {
    providers: Vec<LibraryProvider>,
    ctx: ResolveContext,
    gate: AbiGate,
    client: Arc<TransferClient>,
}

impl LibraryResolver {
    /// Builds the standard chain from resolved settings.
    ///
    /// An explicit path and `TOKENIZERS_LIB_PATH` each join the chain only
    /// when set. The cache and download steps always follow.
    pub fn new(
        settings: &EffectiveSettings,
        client: Arc<TransferClient>,
        loader: Arc<dyn LibraryLoader>,
    ) -> Self {
        let platform = Platform::current();
        let lib = &settings.library;
        let cached = cached_library_path(lib, &platform);

        let mut providers = Vec::with_capacity(4);
        if let Some(path) = &lib.explicit_path {
            providers.push(LibraryProvider::ExplicitPath(path.clone()));
        }
        if let Some(path) = &lib.env_path {
            providers.push(LibraryProvider::EnvironmentPath(path.clone()));
        }
        providers.push(LibraryProvider::CachedArtifact(cached.clone()));
        providers.push(LibraryProvider::RemoteArtifact {
            tag: lib.version.clone(),
            dest: cached,
        });

        Self::with_providers(settings, client, loader, providers)
    }

    /// Builds a resolver over a caller-chosen chain.
    pub fn with_providers(
        settings: &EffectiveSettings,
        client: Arc<TransferClient>,
        loader: Arc<dyn LibraryLoader>,
        providers: Vec<LibraryProvider>,
    ) -> Self {
        let releases = ReleaseApi::new(Arc::clone(&client), &settings.library, &settings.transfer);
        Self {
            providers,
            ctx: ResolveContext {
                loader,
                releases,
                platform: Platform::current(),
                offline: settings.cache.offline_only,
            },
            gate: AbiGate::default(),
            client,
        }
    }

    /// Replaces the ABI gate.
    pub fn with_gate(mut self, gate: AbiGate) -> Self {
        self.gate = gate;
        self
    }

    /// Overrides the platform used for asset and file names.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.ctx.platform = platform;
        self
    }

    /// The chain, in order.
    pub fn providers(&self) -> &[LibraryProvider] {
        &self.providers
    }

    /// Release API used by the download step.
    pub fn releases(&self) -> &ReleaseApi {
        &self.ctx.releases
    }

    /// Runs the chain until a provider yields a library or aborts.
    ///
    /// The loaded library must pass the ABI gate. On success its version is
    /// recorded on the transfer client for the `User-Agent` header.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<NativeLibrary, NativeError> {
        let mut reasons = Vec::new();
        for provider in &self.providers {
            debug!(provider = %provider, "trying library provider");
            match provider.provide(&self.ctx, cancel).await? {
                Provided::Ready(module) => {
                    let reported = module.reported_version()?;
                    let version = self.gate.check(&reported)?;
                    self.client.set_library_version(&version.to_string());
                    info!(
                        provider = provider.name(),
                        path = %module.path().display(),
                        %version,
                        "native library ready"
                    );
                    return Ok(NativeLibrary {
                        module,
                        version,
                        provider: provider.name(),
                    });
                }
                Provided::Next(reason) => {
                    debug!(provider = provider.name(), %reason, "provider declined");
                    reasons.push(reason);
                }
            }
        }
        Err(NativeError::Exhausted { reasons })
    }
}
