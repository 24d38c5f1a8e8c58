//! ARM deployment state and outputs.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error;

/// Deployment resource as returned by the management endpoint.
#[derive(Deserialize, Debug)]
pub struct Deployment {
    pub properties: DeploymentProperties,
}

/// Properties of a deployment, polled until a terminal state.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    /// "Accepted", "Running", "Succeeded", "Failed", "Canceled".
    pub provisioning_state: Option<String>,
    /// Template outputs, present once the deployment succeeded.
    pub outputs: Option<Map<String, Value>>,
    /// Error detail, present once the deployment failed.
    pub error: Option<Value>,
}

/// Outputs of a finished deployment, keyed by output name.
///
/// ARM wraps each output as `{"type": ..., "value": ...}`; the accessors
/// unwrap that and fail with the output name when a template did not
/// produce what the next step needs.
#[derive(Debug, Default)]
pub struct DeploymentOutputs(Map<String, Value>);

impl DeploymentOutputs {
    pub fn new(outputs: Map<String, Value>) -> Self {
        DeploymentOutputs(outputs)
    }

    /// A string-typed output.
    pub fn string(&self, key: &str) -> Result<String, Box<dyn Error>> {
        self.value(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("Deployment output {key:?} missing or not a string").into())
    }

    /// An integer-typed output.
    pub fn count(&self, key: &str) -> Result<i64, Box<dyn Error>> {
        self.value(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| format!("Deployment output {key:?} missing or not an integer").into())
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).and_then(|output| output.get("value"))
    }
}
