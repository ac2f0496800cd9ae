//! Task-runner settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::params::{flatten, to_key_value, ParamDecl, ParamTree};

/// Reserved parameter-tree name for the task-runner settings.
pub const SNAKEMAKE_PARAMS_NAME: &str = "snakemake";

pub fn param_decls() -> Vec<ParamDecl> {
    vec![
        ParamDecl::bool("use_conda", true),
        ParamDecl::int("cores", 2),
        ParamDecl::bool("forceall", false),
        ParamDecl::bool("forcetargets", true),
        ParamDecl::bool("lock", false),
    ]
}

/// A node the user asked to re-execute even if its outputs are current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceRun {
    pub node_id: String,
    pub name: String,
}

/// Resolved settings for one invocation of the task runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmkParam {
    pub use_conda: bool,
    pub cores: u32,
    pub forceall: bool,
    pub forcetargets: bool,
    pub lock: bool,
    #[serde(default)]
    pub forcerun: Vec<ForceRun>,
}

impl SmkParam {
    /// Build from a merged, type-fixed settings tree.
    pub fn from_tree(tree: &ParamTree, forcerun: Vec<ForceRun>) -> Result<Self, CoreError> {
        let mut values: Map<String, Value> = flatten(&to_key_value(tree));
        values.insert(
            "forcerun".to_string(),
            serde_json::to_value(&forcerun).map_err(|e| CoreError::Internal(e.to_string()))?,
        );
        serde_json::from_value(Value::Object(values))
            .map_err(|e| CoreError::Validation(format!("Invalid snakemake settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{build_param_tree, merge_params, parse_stored_params};
    use serde_json::json;

    #[test]
    fn defaults_resolve() {
        let smk = SmkParam::from_tree(&build_param_tree(&param_decls()), vec![]).unwrap();
        assert!(smk.use_conda);
        assert_eq!(smk.cores, 2);
        assert!(!smk.forceall);
        assert!(smk.forcetargets);
        assert!(!smk.lock);
        assert!(smk.forcerun.is_empty());
    }

    #[test]
    fn stored_values_and_forcerun_apply() {
        let stored = parse_stored_params(&json!({"cores": 8, "lock": true})).unwrap();
        let tree = merge_params(&stored, build_param_tree(&param_decls()));
        let force = vec![ForceRun {
            node_id: "n1".into(),
            name: "pca".into(),
        }];

        let smk = SmkParam::from_tree(&tree, force.clone()).unwrap();

        assert_eq!(smk.cores, 8);
        assert!(smk.lock);
        assert_eq!(smk.forcerun, force);
    }

    #[test]
    fn force_run_uses_camel_case_keys() {
        let force: ForceRun = serde_json::from_value(json!({"nodeId": "a", "name": "b"})).unwrap();
        assert_eq!(force.node_id, "a");
    }
}
