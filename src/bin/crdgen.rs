// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from the types in src/crd.rs so that
//! deploy/crds/ never drifts from the Rust definitions.
//!
//! Usage:
//!   cargo run --bin crdgen

use kube::CustomResourceExt;
use routeplane::crd::{Certificate, Configuration, EdgeIngress, Revision, Route};
use serde_json::Value;
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

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<Route>("routes.crd.yaml", output_dir)?;
    generate_crd::<Configuration>("configurations.crd.yaml", output_dir)?;
    generate_crd::<Revision>("revisions.crd.yaml", output_dir)?;
    generate_crd::<Certificate>("certificates.crd.yaml", output_dir)?;
    generate_crd::<EdgeIngress>("edgeingresses.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();

    // Round-trip through JSON so the status subresource is always declared
    let mut crd_json: Value = serde_json::to_value(&crd)?;
    if let Some(versions) = crd_json["spec"]["versions"].as_array_mut() {
        for version in versions.iter_mut() {
            if version["subresources"]["status"].is_null() {
                version["subresources"]["status"] = Value::Object(serde_json::Map::new());
            }
        }
    }

    let yaml = serde_yaml::to_string(&crd_json)?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
