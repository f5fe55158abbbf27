//! Job submissions: what a workflow step asks the backend to do.

use serde::{Deserialize, Serialize};

use super::ids::{AppKey, InstanceId, QuestId};

/// One job submission. Every variant answers with a `JobMeta`.
#[derive(Clone, PartialEq, Eq)]
pub enum JobRequest {
    InstallApp {
        app: AppKey,
    },
    SideloadApp {
        manifest: String,
    },
    UninstallApp {
        app: AppKey,
    },
    CreateInstance {
        app: AppKey,
        instance_name: Option<String>,
    },
    StartInstance {
        instance: InstanceId,
    },
    StopInstance {
        instance: InstanceId,
    },
    DeleteInstance {
        instance: InstanceId,
    },
    /// Migrate an instance to another version of its app.
    UpdateInstance {
        instance: InstanceId,
        to: String,
    },
    Export {
        apps: Vec<AppKey>,
        instances: Vec<InstanceId>,
    },
    /// Import an export archive that has already been read into memory.
    Import {
        file_name: String,
        archive: Vec<u8>,
    },
}

impl JobRequest {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JobRequest::InstallApp { .. } => "install-app",
            JobRequest::SideloadApp { .. } => "sideload-app",
            JobRequest::UninstallApp { .. } => "uninstall-app",
            JobRequest::CreateInstance { .. } => "create-instance",
            JobRequest::StartInstance { .. } => "start-instance",
            JobRequest::StopInstance { .. } => "stop-instance",
            JobRequest::DeleteInstance { .. } => "delete-instance",
            JobRequest::UpdateInstance { .. } => "update-instance",
            JobRequest::Export { .. } => "export",
            JobRequest::Import { .. } => "import",
        }
    }
}

// Archives can be large; keep them out of logs.
impl std::fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobRequest::InstallApp { app } => f.debug_struct("InstallApp").field("app", app).finish(),
            JobRequest::SideloadApp { manifest } => f
                .debug_struct("SideloadApp")
                .field("manifest_len", &manifest.len())
                .finish(),
            JobRequest::UninstallApp { app } => {
                f.debug_struct("UninstallApp").field("app", app).finish()
            }
            JobRequest::CreateInstance { app, instance_name } => f
                .debug_struct("CreateInstance")
                .field("app", app)
                .field("instance_name", instance_name)
                .finish(),
            JobRequest::StartInstance { instance } => f
                .debug_struct("StartInstance")
                .field("instance", instance)
                .finish(),
            JobRequest::StopInstance { instance } => f
                .debug_struct("StopInstance")
                .field("instance", instance)
                .finish(),
            JobRequest::DeleteInstance { instance } => f
                .debug_struct("DeleteInstance")
                .field("instance", instance)
                .finish(),
            JobRequest::UpdateInstance { instance, to } => f
                .debug_struct("UpdateInstance")
                .field("instance", instance)
                .field("to", to)
                .finish(),
            JobRequest::Export { apps, instances } => f
                .debug_struct("Export")
                .field("apps", apps)
                .field("instances", instances)
                .finish(),
            JobRequest::Import { file_name, archive } => f
                .debug_struct("Import")
                .field("file_name", file_name)
                .field("archive_len", &archive.len())
                .finish(),
        }
    }
}

/// Backend answer to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    #[serde(rename = "jobId")]
    pub job_id: QuestId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_meta_uses_camel_case_job_id() {
        let meta: JobMeta = serde_json::from_str(r#"{"jobId": 42}"#).unwrap();
        assert_eq!(meta.job_id, QuestId::new(42));
    }

    #[test]
    fn debug_hides_archive_bytes() {
        let req = JobRequest::Import {
            file_name: "backup.tar".to_string(),
            archive: vec![0u8; 4096],
        };
        let s = format!("{req:?}");
        assert!(s.contains("archive_len: 4096"));
        assert_eq!(req.kind(), "import");
    }
}
