//! Deployment inputs and the immutable plan built from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use flotilla_core::{AppManifest, ConfigError, EnvOverrides, GitSource, Node};

/// Local file the host table is written to by default.
pub const HOSTS_ARTIFACT: &str = "hosts_deployment.txt";

/// Everything a user asks of one deployment run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub git_url: String,
    pub group: String,
    pub node_count: usize,
    /// Instances per node.
    pub scale: usize,
    pub branch: String,
    /// App directory relative to the remote home.
    pub app_path: String,
    pub blacklist: Vec<String>,
    pub shuffle_nodes: bool,
    /// Seed for node and instance shuffles; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub skip_health_check: bool,
    pub sudo: bool,
    /// `VAR1=VAL1,VAR2=VAL2`, exported after the manifest env.
    pub env_overrides: String,
    pub node_exporter: bool,
    /// Local host table artifact; `None` skips writing it.
    pub hosts_file: Option<PathBuf>,
    /// Service-discovery export; `None` skips it.
    pub sd_path: Option<PathBuf>,
}

impl DeployRequest {
    pub fn new(git_url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            git_url: git_url.into(),
            group: group.into(),
            node_count: 1,
            scale: 1,
            branch: "master".to_string(),
            app_path: "app".to_string(),
            blacklist: Vec::new(),
            shuffle_nodes: false,
            seed: None,
            skip_health_check: false,
            sudo: false,
            env_overrides: String::new(),
            node_exporter: false,
            hosts_file: Some(PathBuf::from(HOSTS_ARTIFACT)),
            sd_path: None,
        }
    }

    /// Checks that need no remote work.
    pub fn validate(&self) -> Result<(GitSource, EnvOverrides), ConfigError> {
        let source = GitSource::parse(&self.git_url)?;
        let overrides = EnvOverrides::parse(&self.env_overrides)?;
        if self.node_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "node_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scale == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scale",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.app_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "app_path",
                reason: "must not be empty".to_string(),
            });
        }
        Ok((source, overrides))
    }

    pub fn instance_count(&self) -> usize {
        self.node_count * self.scale
    }
}

/// One application instance to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceJob {
    pub node: Node,
    /// Index among the instances of `node`, in `0..scale`.
    pub local_index: usize,
    /// Position in the host table: node position × scale + local index.
    pub global_index: usize,
}

/// Resolved inputs of a deployment. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub app: GitSource,
    pub group: String,
    pub nodes: Vec<Node>,
    pub scale: usize,
    pub branch: String,
    pub app_path: String,
    pub bootstrap: Vec<String>,
    pub launch: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub overrides: EnvOverrides,
    pub sudo: bool,
    pub node_exporter: bool,
}

impl DeploymentPlan {
    pub fn new(
        request: &DeployRequest,
        app: GitSource,
        overrides: EnvOverrides,
        nodes: Vec<Node>,
        manifest: AppManifest,
    ) -> Self {
        Self {
            app,
            group: request.group.clone(),
            nodes,
            scale: request.scale,
            branch: request.branch.clone(),
            app_path: request.app_path.clone(),
            bootstrap: manifest.bootstrap,
            launch: manifest.launch,
            env: manifest.env,
            overrides,
            sudo: request.sudo,
            node_exporter: request.node_exporter,
        }
    }

    pub fn instance_count(&self) -> usize {
        self.nodes.len() * self.scale
    }

    /// Every node expanded into `scale` instances, node by node.
    pub fn instance_jobs(&self) -> Vec<InstanceJob> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(position, node)| {
                (0..self.scale).map(move |local_index| InstanceJob {
                    node: node.clone(),
                    local_index,
                    global_index: position * self.scale + local_index,
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn plan(nodes: usize, scale: usize) -> DeploymentPlan {
        let mut request = DeployRequest::new("https://example.com/app.git", "slice");
        request.node_count = nodes;
        request.scale = scale;
        let (app, overrides) = request.validate().unwrap();
        let manifest = AppManifest::parse(
            r#"
bootstrap = ["make deps"]
launch = ["./bin/app"]

[env]
MODE = "test"
"#,
        )
        .unwrap();
        let nodes = (0..nodes)
            .map(|i| Node::new(format!("node{i}.example.org"), i as u64 + 100))
            .collect();
        DeploymentPlan::new(&request, app, overrides, nodes, manifest)
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        let mut request = DeployRequest::new("https://example.com/app", "slice");
        assert!(matches!(
            request.validate(),
            Err(ConfigError::InvalidGitUrl(_))
        ));

        request.git_url = "https://example.com/app.git".to_string();
        request.env_overrides = "A=1,B".to_string();
        assert!(matches!(
            request.validate(),
            Err(ConfigError::MalformedOverride(_))
        ));

        request.env_overrides = "A=1".to_string();
        request.scale = 0;
        assert!(matches!(
            request.validate(),
            Err(ConfigError::InvalidValue { field: "scale", .. })
        ));

        request.scale = 1;
        request.node_count = 0;
        assert!(matches!(
            request.validate(),
            Err(ConfigError::InvalidValue { field: "node_count", .. })
        ));
    }

    #[test]
    fn validate_accepts_defaults() {
        let request = DeployRequest::new("git@example.com:team/app.git", "slice");
        let (source, overrides) = request.validate().unwrap();
        assert_eq!(source.name, "app");
        assert!(overrides.is_empty());
    }

    #[test]
    fn scale_three_over_two_nodes_is_six_jobs() {
        let jobs = plan(2, 3).instance_jobs();
        assert_eq!(jobs.len(), 6);

        let locals: Vec<usize> = jobs.iter().map(|j| j.local_index).collect();
        assert_eq!(locals, vec![0, 1, 2, 0, 1, 2]);

        let globals: Vec<usize> = jobs.iter().map(|j| j.global_index).collect();
        assert_eq!(globals, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(jobs[3].node.hostname, "node1.example.org");
    }

    #[test]
    fn instance_count_matches_jobs() {
        for (nodes, scale) in [(1, 1), (3, 2), (5, 4)] {
            let plan = plan(nodes, scale);
            assert_eq!(plan.instance_jobs().len(), plan.instance_count());
        }
    }

    #[test]
    fn plan_copies_manifest_sections() {
        let plan = plan(1, 1);
        assert_eq!(plan.bootstrap, vec!["make deps"]);
        assert_eq!(plan.launch, vec!["./bin/app"]);
        assert_eq!(plan.env.get("MODE").map(String::as_str), Some("test"));
    }
}
