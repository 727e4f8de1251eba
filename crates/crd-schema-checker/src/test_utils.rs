use k8s_openapi::{
    apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
        CustomResourceDefinitionVersion, CustomResourceValidation, JSONSchemaProps,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

pub fn schema(value: serde_json::Value) -> JSONSchemaProps {
    serde_json::from_value(value).expect("test schema must deserialize")
}

/// Builds a CRD named `name` with one version per `(version, schema)` pair.
pub fn crd(name: &str, versions: Vec<(&str, serde_json::Value)>) -> CustomResourceDefinition {
    let versions = versions
        .into_iter()
        .enumerate()
        .map(|(index, (version, value))| CustomResourceDefinitionVersion {
            name: version.to_owned(),
            served: true,
            storage: index == 0,
            schema: Some(CustomResourceValidation {
                open_api_v3_schema: Some(schema(value)),
            }),
            ..Default::default()
        })
        .collect();

    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            ..Default::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: "example.com".to_owned(),
            names: CustomResourceDefinitionNames {
                kind: "Example".to_owned(),
                plural: "examples".to_owned(),
                ..Default::default()
            },
            scope: "Namespaced".to_owned(),
            versions,
            ..Default::default()
        },
        status: None,
    }
}

/// Shorthand for a CRD called `X` with a single `v1` version.
pub fn crd_v1(value: serde_json::Value) -> CustomResourceDefinition {
    crd("X", vec![("v1", value)])
}
