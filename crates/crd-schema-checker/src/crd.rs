//! Loading CRD manifests and looking up their parts.

use std::path::{Path, PathBuf};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionVersion, JSONSchemaProps,
};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

const CRD_KIND: &str = "CustomResourceDefinition";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read CRD manifest at {path}", path = path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse YAML document {index} of {path}", path = path.display()))]
    ParseDocument {
        source: serde_yaml::Error,
        path: PathBuf,
        index: usize,
    },

    #[snafu(display("failed to deserialize CustomResourceDefinition from document {index} of {path}", path = path.display()))]
    DeserializeCrd {
        source: serde_yaml::Error,
        path: PathBuf,
        index: usize,
    },
}

/// Reads every CustomResourceDefinition from the (multi-document) YAML file at
/// `path`. Empty documents and documents of any other kind are skipped.
pub fn load_crds(path: impl AsRef<Path>) -> Result<Vec<CustomResourceDefinition>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;

    parse_crds(&contents, path)
}

/// Parses every CustomResourceDefinition from the YAML `contents`. `origin` is
/// only used for error messages.
pub fn parse_crds(contents: &str, origin: &Path) -> Result<Vec<CustomResourceDefinition>> {
    let mut crds = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .context(ParseDocumentSnafu { path: origin, index })?;

        let kind = value.get("kind").and_then(serde_yaml::Value::as_str);
        if kind != Some(CRD_KIND) {
            tracing::debug!(index, ?kind, path = %origin.display(), "skipping non-CRD document");
            continue;
        }

        let crd = serde_yaml::from_value(value)
            .context(DeserializeCrdSnafu { path: origin, index })?;
        crds.push(crd);
    }

    Ok(crds)
}

/// Returns the name of `crd`, or an empty string if it has none.
pub fn crd_name(crd: &CustomResourceDefinition) -> &str {
    crd.metadata.name.as_deref().unwrap_or_default()
}

pub fn version_by_name<'a>(
    crd: &'a CustomResourceDefinition,
    name: &str,
) -> Option<&'a CustomResourceDefinitionVersion> {
    crd.spec.versions.iter().find(|version| version.name == name)
}

/// Returns the OpenAPI v3 schema of `version`, if it declares one.
pub fn version_schema(version: &CustomResourceDefinitionVersion) -> Option<&JSONSchemaProps> {
    version
        .schema
        .as_ref()
        .and_then(|validation| validation.open_api_v3_schema.as_ref())
}

/// Yields every version of `new` that also exists in `existing`, together
/// with both schemas. Versions missing a schema on either side are skipped.
pub fn shared_version_schemas<'a>(
    existing: &'a CustomResourceDefinition,
    new: &'a CustomResourceDefinition,
) -> impl Iterator<Item = (&'a str, &'a JSONSchemaProps, &'a JSONSchemaProps)> {
    new.spec.versions.iter().filter_map(move |new_version| {
        let existing_version = version_by_name(existing, &new_version.name)?;
        let existing_schema = version_schema(existing_version)?;
        let new_schema = version_schema(new_version)?;

        Some((new_version.name.as_str(), existing_schema, new_schema))
    })
}

/// Pairs every CRD of `new` with the CRD of the same name in `existing`.
///
/// CRDs which only exist in `new` are paired with [`None`]. CRDs which were
/// removed entirely are not part of the output.
pub fn pair_crds<'a>(
    existing: &'a [CustomResourceDefinition],
    new: &'a [CustomResourceDefinition],
) -> Vec<(Option<&'a CustomResourceDefinition>, &'a CustomResourceDefinition)> {
    new.iter()
        .map(|new_crd| {
            let existing_crd = existing
                .iter()
                .find(|existing_crd| crd_name(existing_crd) == crd_name(new_crd));
            (existing_crd, new_crd)
        })
        .collect()
}
