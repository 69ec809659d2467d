//! Experiment definitions for `POST /createExperiment`.
//!
//! Container-scoped and namespace-scoped experiments are built by separate
//! constructors; the serialized shape of each follows from its
//! [`KubernetesObject`] variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const REMOTE_EXPERIMENT_NAME: &str = "quarkus-resteasy-kruize-min-http-response-time-db";
pub const REMOTE_NAMESPACE_EXPERIMENT_NAME: &str = "namespace-demo";
pub const LOCAL_CONTAINER_EXPERIMENT_NAME: &str = "monitor-sysbench";
pub const LOCAL_NAMESPACE_EXPERIMENT_NAME: &str = "monitor-ns";

pub const REMOTE_PERFORMANCE_PROFILE: &str = "resource-optimization-openshift";
pub const LOCAL_PERFORMANCE_PROFILE: &str = "resource-optimization-local-monitoring";
pub const LOCAL_METADATA_PROFILE: &str = "cluster-metadata-local-monitoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentType {
    Container,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub container_image_name: String,
    pub container_name: String,
}

impl ContainerRef {
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container_image_name: image.into(),
            container_name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRef {
    pub namespace: String,
}

/// One entry of `kubernetes_objects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KubernetesObject {
    Workload {
        #[serde(rename = "type")]
        kind: String,
        name: String,
        namespace: String,
        containers: Vec<ContainerRef>,
    },
    Namespace {
        namespaces: NamespaceRef,
    },
}

impl KubernetesObject {
    pub fn workload(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        containers: Vec<ContainerRef>,
    ) -> Self {
        Self::Workload {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            containers,
        }
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self::Namespace {
            namespaces: NamespaceRef {
                namespace: namespace.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSettings {
    pub measurement_duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSettings {
    pub threshold: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub version: String,
    pub experiment_name: String,
    pub cluster_name: String,
    pub performance_profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_profile: Option<String>,
    pub mode: String,
    pub target_cluster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
    pub experiment_type: ExperimentType,
    pub kubernetes_objects: Vec<KubernetesObject>,
    pub trial_settings: TrialSettings,
    pub recommendation_settings: RecommendationSettings,
}

impl Experiment {
    fn base(name: &str, experiment_type: ExperimentType, object: KubernetesObject) -> Self {
        Self {
            version: "v2.0".into(),
            experiment_name: name.into(),
            cluster_name: "default".into(),
            performance_profile: REMOTE_PERFORMANCE_PROFILE.into(),
            metadata_profile: None,
            mode: "monitor".into(),
            target_cluster: "remote".into(),
            datasource: None,
            experiment_type,
            kubernetes_objects: vec![object],
            trial_settings: TrialSettings {
                measurement_duration: "15min".into(),
            },
            recommendation_settings: RecommendationSettings {
                threshold: "0.1".into(),
            },
        }
    }

    /// Remote monitoring container experiment used by most results scenarios:
    /// deployment `tfb-qrh-sample` with two containers.
    pub fn remote_container() -> Self {
        Self::base(
            REMOTE_EXPERIMENT_NAME,
            ExperimentType::Container,
            KubernetesObject::workload(
                "deployment",
                "tfb-qrh-sample",
                "default",
                vec![
                    ContainerRef::new("kruize/tfb-db:1.15", "tfb-server-0"),
                    ContainerRef::new("kruize/tfb-qrh:1.13.2.F_et17", "tfb-server-1"),
                ],
            ),
        )
    }

    /// Remote monitoring namespace experiment on namespace `default`.
    pub fn remote_namespace() -> Self {
        Self::base(
            REMOTE_NAMESPACE_EXPERIMENT_NAME,
            ExperimentType::Namespace,
            KubernetesObject::namespace("default"),
        )
    }

    /// Local monitoring container experiment against the given workload.
    pub fn local_container(
        name: &str,
        workload: &str,
        namespace: &str,
        containers: Vec<ContainerRef>,
    ) -> Self {
        Self::base(
            name,
            ExperimentType::Container,
            KubernetesObject::workload("deployment", workload, namespace, containers),
        )
        .into_local()
    }

    /// Local monitoring namespace experiment.
    pub fn local_namespace(name: &str, namespace: &str) -> Self {
        Self::base(name, ExperimentType::Namespace, KubernetesObject::namespace(namespace))
            .into_local()
    }

    /// The sysbench workload in `namespace`.
    pub fn local_sysbench(namespace: &str) -> Self {
        Self::local_container(
            LOCAL_CONTAINER_EXPERIMENT_NAME,
            "sysbench",
            namespace,
            vec![ContainerRef::new("quay.io/kruizehub/sysbench", "sysbench")],
        )
    }

    fn into_local(mut self) -> Self {
        self.target_cluster = "local".into();
        self.performance_profile = LOCAL_PERFORMANCE_PROFILE.into();
        self.metadata_profile = Some(LOCAL_METADATA_PROFILE.into());
        self.datasource = Some("prometheus-1".into());
        self.trial_settings.measurement_duration = "2min".into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_measurement_duration(mut self, duration: impl Into<String>) -> Self {
        self.trial_settings.measurement_duration = duration.into();
        self
    }

    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    pub fn with_cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self
    }

    /// Keep only the first `count` containers of every workload object.
    pub fn with_container_count(mut self, count: usize) -> Self {
        for object in &mut self.kubernetes_objects {
            if let KubernetesObject::Workload { containers, .. } = object {
                containers.truncate(count);
            }
        }
        self
    }

    /// Copy `i` of this experiment: the experiment name and every workload
    /// name get a `_{i}` suffix so copies never collide.
    pub fn numbered(&self, i: usize) -> Self {
        let mut copy = self.clone();
        copy.experiment_name = format!("{}_{i}", self.experiment_name);
        for object in &mut copy.kubernetes_objects {
            if let KubernetesObject::Workload { name, .. } = object {
                *name = format!("{name}_{i}");
            }
        }
        copy
    }

    pub fn is_namespace(&self) -> bool {
        self.experiment_type == ExperimentType::Namespace
    }

    pub fn measurement_duration(&self) -> &str {
        &self.trial_settings.measurement_duration
    }

    /// Container names across every workload object.
    pub fn container_names(&self) -> Vec<&str> {
        self.kubernetes_objects
            .iter()
            .flat_map(|object| match object {
                KubernetesObject::Workload { containers, .. } => {
                    containers.iter().map(|c| c.container_name.as_str()).collect()
                }
                KubernetesObject::Namespace { .. } => Vec::new(),
            })
            .collect()
    }

    /// The request body: a one-element array.
    pub fn to_payload(&self) -> Result<Value> {
        bulk_payload(std::slice::from_ref(self))
    }
}

/// Several experiments in one request body (rejected by the service).
pub fn bulk_payload(experiments: &[Experiment]) -> Result<Value> {
    Ok(serde_json::to_value(experiments)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_remote_container_shape() {
        let payload = Experiment::remote_container().to_payload().unwrap();
        assert_eq!(payload[0]["experiment_type"], json!("container"));
        assert_eq!(payload[0]["trial_settings"]["measurement_duration"], json!("15min"));
        assert_eq!(payload[0]["kubernetes_objects"][0]["type"], json!("deployment"));
        assert_eq!(
            payload[0]["kubernetes_objects"][0]["containers"][1]["container_name"],
            json!("tfb-server-1")
        );
        assert!(payload[0].get("datasource").is_none());
        assert!(payload[0]["kubernetes_objects"][0].get("namespaces").is_none());
    }

    #[test]
    fn test_namespace_shape_has_no_container_keys() {
        let payload = Experiment::local_namespace(LOCAL_NAMESPACE_EXPERIMENT_NAME, "default")
            .to_payload()
            .unwrap();
        assert_eq!(
            payload[0]["kubernetes_objects"],
            json!([{"namespaces": {"namespace": "default"}}])
        );
        assert_eq!(payload[0]["target_cluster"], json!("local"));
        assert_eq!(payload[0]["metadata_profile"], json!(LOCAL_METADATA_PROFILE));
        assert_eq!(payload[0]["trial_settings"]["measurement_duration"], json!("2min"));
    }

    #[test]
    fn test_untagged_round_trip_picks_variant() {
        let exp = Experiment::remote_namespace();
        let back: Experiment = serde_json::from_value(serde_json::to_value(&exp).unwrap()).unwrap();
        assert_eq!(back, exp);
        assert!(back.is_namespace());
        assert!(back.container_names().is_empty());
    }

    #[test]
    fn test_numbered_copies() {
        let copy = Experiment::remote_container().numbered(3);
        assert_eq!(copy.experiment_name, format!("{REMOTE_EXPERIMENT_NAME}_3"));
        match &copy.kubernetes_objects[0] {
            KubernetesObject::Workload { name, .. } => assert_eq!(name, "tfb-qrh-sample_3"),
            other => panic!("unexpected object {other:?}"),
        }
        assert_eq!(copy.container_names(), vec!["tfb-server-0", "tfb-server-1"]);
    }

    #[test]
    fn test_bulk_payload_keeps_every_experiment() {
        let experiments: Vec<Experiment> = (0..3)
            .map(|i| Experiment::remote_container().with_container_count(1).numbered(i))
            .collect();
        let payload = bulk_payload(&experiments).unwrap();
        let names: Vec<&str> = payload
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["experiment_name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names[2].ends_with("_2"));
        assert_eq!(experiments[0].container_names(), vec!["tfb-server-0"]);
    }
}
