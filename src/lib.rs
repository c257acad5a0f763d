//! SDK root filesystem population.
//!
//! This crate installs a declared set of packages into the two sysroots of
//! an SDK, a target-architecture sysroot and a host/native-tooling sysroot,
//! through one of three interchangeable packaging technologies:
//!
//! - **rpm** - `createrepo_c` indexes, `dnf --installroot` transactions
//! - **ipk** - `opkg-make-index` indexes, `opkg -o` transactions
//! - **deb** - `apt-ftparchive` indexes, `apt-get` transactions
//!
//! # Architecture
//!
//! ```text
//! config ──▶ sdk::select_adapter ──▶ sdk::Adapter
//!                                      ├── target PackageManager (pm::*)
//!                                      ├── host PackageManager   (pm::*)
//!                                      ├── target/host ManifestSource
//!                                      └── Finalizer (sdk::rpm|opkg|dpkg)
//!
//! sdk::Sdk::populate
//!     wipe output ─▶ preprocess hook ─▶ Adapter::populate
//!                ─▶ fixups (libGL*, *.la, ld.so.cache) ─▶ postprocess hook
//! ```
//!
//! The [`probe`] module answers "is this package in the deployed image" and
//! deliberately shares nothing with population.
//!
//! # Example
//!
//! ```rust,ignore
//! use sdk_builder::config::load_config;
//! use sdk_builder::sdk::populate_sdk;
//!
//! let config = load_config("sdk.toml".as_ref())?;
//! let report = populate_sdk(&config)?;
//! println!("{}", report.digest);
//! ```

pub mod arch;
pub mod config;
pub mod env;
pub mod error;
pub mod fsops;
pub mod hooks;
pub mod layout;
pub mod manifest;
pub mod pm;
pub mod preflight;
pub mod probe;
pub mod process;
pub mod sdk;

pub use error::{Phase, PopulateError, SdkError, SdkResult};
pub use layout::SdkLayout;
pub use manifest::{Manifest, ManifestSource, PackageCategory};
pub use pm::PackageManager;
pub use sdk::{populate_sdk, select_adapter, PackageType, PopulateReport, Sdk};
