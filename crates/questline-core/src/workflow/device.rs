//! Device operations built from job steps.
//!
//! | Workflow | Steps |
//! |---|---|
//! | `InstallApp` | install-app, create-instance, start-instance |
//! | `SideloadApp` | sideload-app, create-instance, start-instance |
//! | `UpdateApp` | install-app (new version), update-instance per instance, uninstall-app (old version) |
//! | `InstanceAction` | start, stop or delete one instance |
//! | `UninstallApp`, `ExportApps`, `ImportArchive` | one step each |

use async_trait::async_trait;
use serde::Deserialize;

use super::{StepRunner, Workflow, require_result};
use crate::domain::{AppKey, InstanceId, JobRequest, Quest, WorkflowError};

/// Install an app, create an instance of it and start that instance.
#[derive(Debug, Clone)]
pub struct InstallApp {
    pub app: AppKey,
    pub instance_name: Option<String>,
}

impl InstallApp {
    pub fn new(app: AppKey) -> Self {
        Self {
            app,
            instance_name: None,
        }
    }

    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }
}

#[async_trait]
impl Workflow for InstallApp {
    type Output = InstanceId;

    fn name(&self) -> &'static str {
        "install-app"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<InstanceId, WorkflowError> {
        steps
            .step(
                "install-app",
                JobRequest::InstallApp {
                    app: self.app.clone(),
                },
            )
            .await?;
        create_and_start(steps, &self.app, self.instance_name.clone()).await
    }
}

/// Create an instance of `app` and start it; the created instance id is the
/// create-instance quest's result.
async fn create_and_start(
    steps: &StepRunner<'_>,
    app: &AppKey,
    instance_name: Option<String>,
) -> Result<InstanceId, WorkflowError> {
    let created = steps
        .step(
            "create-instance",
            JobRequest::CreateInstance {
                app: app.clone(),
                instance_name,
            },
        )
        .await?;
    let instance = InstanceId::new(require_result("create-instance", &created)?);

    steps
        .step(
            "start-instance",
            JobRequest::StartInstance {
                instance: instance.clone(),
            },
        )
        .await?;
    Ok(instance)
}

/// Upload a manifest, then create and start an instance of the app it
/// describes.
#[derive(Debug, Clone)]
pub struct SideloadApp {
    pub manifest: String,
    pub instance_name: Option<String>,
}

#[derive(Deserialize)]
struct ManifestHeader {
    app: String,
    version: String,
}

impl SideloadApp {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            instance_name: None,
        }
    }

    /// The app a manifest describes, read from its `app` and `version` keys.
    pub fn app_key(&self) -> Result<AppKey, WorkflowError> {
        let header: ManifestHeader = serde_json::from_str(&self.manifest)
            .map_err(|e| WorkflowError::InvalidInput(format!("unreadable manifest: {e}")))?;
        if header.app.is_empty() || header.version.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "manifest needs a non-empty app and version".to_string(),
            ));
        }
        Ok(AppKey::new(header.app, header.version))
    }
}

#[async_trait]
impl Workflow for SideloadApp {
    type Output = InstanceId;

    fn name(&self) -> &'static str {
        "sideload-app"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<InstanceId, WorkflowError> {
        let app = self.app_key()?;
        steps
            .step(
                "sideload-app",
                JobRequest::SideloadApp {
                    manifest: self.manifest.clone(),
                },
            )
            .await?;
        create_and_start(steps, &app, self.instance_name.clone()).await
    }
}

/// Move an app and all its instances from one version to another (upgrade or
/// downgrade).
#[derive(Debug, Clone)]
pub struct UpdateApp {
    pub app: String,
    pub from: String,
    pub to: String,
    pub instances: Vec<InstanceId>,
}

#[async_trait]
impl Workflow for UpdateApp {
    type Output = ();

    fn name(&self) -> &'static str {
        "update-app"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<(), WorkflowError> {
        if self.from == self.to {
            return Err(WorkflowError::InvalidInput(format!(
                "{} is already at version {}",
                self.app, self.to
            )));
        }

        steps
            .step(
                "install-app",
                JobRequest::InstallApp {
                    app: AppKey::new(&self.app, &self.to),
                },
            )
            .await?;

        let migrations = self
            .instances
            .iter()
            .map(|instance| JobRequest::UpdateInstance {
                instance: instance.clone(),
                to: self.to.clone(),
            })
            .collect();
        steps.steps_concurrently("update-instance", migrations).await?;

        steps
            .step(
                "uninstall-app",
                JobRequest::UninstallApp {
                    app: AppKey::new(&self.app, &self.from),
                },
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOp {
    Start,
    Stop,
    Delete,
}

/// Start, stop or delete one instance.
#[derive(Debug, Clone)]
pub struct InstanceAction {
    pub instance: InstanceId,
    pub op: InstanceOp,
}

impl InstanceAction {
    pub fn start(instance: InstanceId) -> Self {
        Self {
            instance,
            op: InstanceOp::Start,
        }
    }

    pub fn stop(instance: InstanceId) -> Self {
        Self {
            instance,
            op: InstanceOp::Stop,
        }
    }

    pub fn delete(instance: InstanceId) -> Self {
        Self {
            instance,
            op: InstanceOp::Delete,
        }
    }
}

#[async_trait]
impl Workflow for InstanceAction {
    type Output = Quest;

    fn name(&self) -> &'static str {
        match self.op {
            InstanceOp::Start => "start-instance",
            InstanceOp::Stop => "stop-instance",
            InstanceOp::Delete => "delete-instance",
        }
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<Quest, WorkflowError> {
        let instance = self.instance.clone();
        let request = match self.op {
            InstanceOp::Start => JobRequest::StartInstance { instance },
            InstanceOp::Stop => JobRequest::StopInstance { instance },
            InstanceOp::Delete => JobRequest::DeleteInstance { instance },
        };
        steps.step(self.name(), request).await
    }
}

#[derive(Debug, Clone)]
pub struct UninstallApp {
    pub app: AppKey,
}

#[async_trait]
impl Workflow for UninstallApp {
    type Output = ();

    fn name(&self) -> &'static str {
        "uninstall-app"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<(), WorkflowError> {
        steps
            .step(
                "uninstall-app",
                JobRequest::UninstallApp {
                    app: self.app.clone(),
                },
            )
            .await?;
        Ok(())
    }
}

/// Export apps and instances. The output is the export's id, when the
/// backend reports one.
#[derive(Debug, Clone)]
pub struct ExportApps {
    pub apps: Vec<AppKey>,
    pub instances: Vec<InstanceId>,
}

#[async_trait]
impl Workflow for ExportApps {
    type Output = Option<String>;

    fn name(&self) -> &'static str {
        "export"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<Option<String>, WorkflowError> {
        if self.apps.is_empty() && self.instances.is_empty() {
            return Err(WorkflowError::InvalidInput("nothing to export".to_string()));
        }
        let quest = steps
            .step(
                "export",
                JobRequest::Export {
                    apps: self.apps.clone(),
                    instances: self.instances.clone(),
                },
            )
            .await?;
        Ok(quest.result)
    }
}

#[derive(Clone)]
pub struct ImportArchive {
    pub file_name: String,
    pub archive: Vec<u8>,
}

impl std::fmt::Debug for ImportArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportArchive")
            .field("file_name", &self.file_name)
            .field("archive_len", &self.archive.len())
            .finish()
    }
}

#[async_trait]
impl Workflow for ImportArchive {
    type Output = ();

    fn name(&self) -> &'static str {
        "import"
    }

    async fn run(&self, steps: &StepRunner<'_>) -> Result<(), WorkflowError> {
        if self.archive.is_empty() {
            return Err(WorkflowError::InvalidInput(format!("{} is empty", self.file_name)));
        }
        steps
            .step(
                "import",
                JobRequest::Import {
                    file_name: self.file_name.clone(),
                    archive: self.archive.clone(),
                },
            )
            .await?;
        Ok(())
    }
}
