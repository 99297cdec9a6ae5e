//! sdkdeps - Android SDK dependency preparation
//!
//! Declares the Android SDK components a build needs, downloads them through a
//! local cache, unpacks them with path stripping and filters, and publishes
//! `android.jar`, `dx.jar` and a dx sources jar.
//!
//! ## Architecture
//!
//! - `sdkdeps-core`: coordinates, component table, configuration, errors
//! - `sdkdeps-toolchain`: repositories, cache, extraction, preparation steps

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use sdkdeps_core as core;
pub use sdkdeps_toolchain as toolchain;
