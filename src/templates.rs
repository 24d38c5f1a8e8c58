//! Template retrieval and scratch storage.
//!
//! Templates are fetched from a fixed base URL into a per-run scratch
//! directory and parsed before the first deployment starts. The scratch
//! directory is removed when the run ends, success or failure. The template
//! source is trusted: no hash or signature check happens here.

use chrono::Utc;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// One downloadable resource template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpec {
    /// Step the template belongs to, used in logs and deployment names.
    pub key: &'static str,
    /// File name under the template base URL, also used as the local name.
    pub remote_name: &'static str,
}

/// The three templates every run deploys, in order.
pub const TEMPLATES: [TemplateSpec; 3] = [
    TemplateSpec {
        key: "identity",
        remote_name: "service-principal.json",
    },
    TemplateSpec {
        key: "workspace",
        remote_name: "workspace-dcr.json",
    },
    TemplateSpec {
        key: "permissions",
        remote_name: "role-assignments.json",
    },
];

/// Parsed template bodies for one run.
#[derive(Debug)]
pub struct TemplateSet {
    pub service_principal: Value,
    pub workspace: Value,
    pub permissions: Value,
}

/// Scratch directory for downloaded templates.
///
/// Removing it on drop covers every exit path, including early returns on
/// deployment failure.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create() -> Result<Self, Box<dyn Error>> {
        let name = format!(
            "az-onboarding-{}-{}",
            std::process::id(),
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = std::env::temp_dir().join(name);
        fs::create_dir_all(&path)
            .map_err(|e| format!("Error creating scratch dir {}: {e}", path.display()))?;
        log::info!("Scratch dir: {}", path.display());
        Ok(ScratchDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::warn!("Could not remove scratch dir {}: {e}", self.path.display());
        } else {
            log::debug!("Removed scratch dir {}", self.path.display());
        }
    }
}

/// Download every template into the scratch dir and parse it.
pub async fn fetch_all(
    http: &reqwest::Client,
    base_url: &str,
    scratch: &ScratchDir,
) -> Result<TemplateSet, Box<dyn Error>> {
    let service_principal = fetch_template(http, base_url, &TEMPLATES[0], scratch).await?;
    let workspace = fetch_template(http, base_url, &TEMPLATES[1], scratch).await?;
    let permissions = fetch_template(http, base_url, &TEMPLATES[2], scratch).await?;
    Ok(TemplateSet {
        service_principal,
        workspace,
        permissions,
    })
}

/// Fetch one template into the scratch dir, then load it from disk so the
/// downloaded file sticks around for debugging until the run ends.
async fn fetch_template(
    http: &reqwest::Client,
    base_url: &str,
    entry: &TemplateSpec,
    scratch: &ScratchDir,
) -> Result<Value, Box<dyn Error>> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), entry.remote_name);
    log::info!("Fetching template {key} from {url}", key = entry.key);

    let response = http.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("Template download {url} returned {status}").into());
    }
    let body = response.text().await?;

    let local = scratch.path().join(entry.remote_name);
    fs::write(&local, &body)
        .map_err(|e| format!("Error writing template {}: {e}", local.display()))?;
    load_template(&local)
}

/// Parse a template file, naming the offending JSON path on failure.
pub fn load_template(path: &Path) -> Result<Value, Box<dyn Error>> {
    let body = fs::read_to_string(path)
        .map_err(|e| format!("Error reading template {}: {e}", path.display()))?;
    let mut deserializer = serde_json::Deserializer::from_str(&body);
    let template: Value = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        format!(
            "Error parsing template {}: path={} error={}",
            path.display(),
            e.path(),
            e
        )
    })?;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let scratch = ScratchDir::create().expect("create scratch");
        let path = scratch.path().to_path_buf();
        fs::write(path.join("probe.json"), "{}").expect("write probe");
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists(), "scratch dir should be gone after drop");
    }

    #[test]
    fn test_scratch_dir_removed_on_error_path() {
        fn provision(fail: bool) -> Result<PathBuf, Box<dyn Error>> {
            let scratch = ScratchDir::create()?;
            let path = scratch.path().to_path_buf();
            if fail {
                return Err(format!("simulated failure after {}", path.display()).into());
            }
            Ok(path)
        }

        let err = provision(true).expect_err("should fail");
        let path = err
            .to_string()
            .rsplit_once(' ')
            .map(|(_, p)| PathBuf::from(p))
            .expect("path in message");
        assert!(!path.exists(), "scratch dir should be gone after the error");
    }

    #[test]
    fn test_load_template_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("workspace-dcr.json");
        fs::write(&path, r#"{"resources": [], "outputs": {}}"#).expect("write");
        let template = load_template(&path).expect("parse");
        assert!(template["resources"].is_array());
    }

    #[test]
    fn test_load_template_invalid_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");
        let err = load_template(&path).expect_err("should fail");
        assert!(err.to_string().contains("broken.json"), "got: {err}");
    }

    #[test]
    fn test_catalog_covers_all_steps() {
        let keys: Vec<&str> = TEMPLATES.iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["identity", "workspace", "permissions"]);
    }
}
