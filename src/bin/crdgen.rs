// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the ClusterManager CRD YAML from the Rust types in src/crd.rs.
//! This ensures the YAML in deploy/crds/ is always in sync with the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use hubmgr::crd::ClusterManager;
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML from src/crd.rs...");

    let crd = ClusterManager::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    let path = output_dir.join("clustermanagers.crd.yaml");
    fs::write(&path, format!("{COPYRIGHT_HEADER}{yaml}"))?;

    println!("Wrote {}", path.display());
    Ok(())
}
