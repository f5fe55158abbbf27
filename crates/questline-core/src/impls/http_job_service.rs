//! HttpJobService - デバイス API (`/api/v2`) の REST アダプタ
//!
//! Every submission answers `{ "jobId": n }`. Quests are read from
//! `GET quests` / `GET quests/{id}`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{ConfigError, HttpConfig};
use crate::domain::{JobMeta, JobRequest, Quest, QuestId, ServiceError};
use crate::ports::JobService;

#[derive(Debug, Clone)]
pub struct HttpJobService {
    client: Client,
    base_url: Url,
}

/// Where and how a submission goes.
#[derive(Debug, Clone, PartialEq)]
struct Route {
    method: Method,
    /// Raw path segments; each one is percent-encoded on its own.
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Body,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Empty,
    Json(Value),
    Archive { file_name: String, bytes: Vec<u8> },
}

impl Route {
    fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    fn path(&self) -> String {
        self.segments.join("/")
    }

    fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

fn route(request: JobRequest) -> Route {
    match request {
        JobRequest::InstallApp { app } => {
            Route::new(Method::POST, &["apps", "install"]).json(json!({ "appKey": app }))
        }
        JobRequest::SideloadApp { manifest } => {
            Route::new(Method::POST, &["apps", "sideload"]).json(json!({ "manifest": manifest }))
        }
        JobRequest::UninstallApp { app } => {
            Route::new(Method::DELETE, &["apps", &app.name]).query("version", app.version)
        }
        JobRequest::CreateInstance { app, instance_name } => {
            let mut body = json!({ "appKey": app });
            if let Some(name) = instance_name {
                body["instanceName"] = json!(name);
            }
            Route::new(Method::POST, &["instances", "create"]).json(body)
        }
        JobRequest::StartInstance { instance } => {
            Route::new(Method::POST, &["instances", instance.as_str(), "start"])
        }
        JobRequest::StopInstance { instance } => {
            Route::new(Method::POST, &["instances", instance.as_str(), "stop"])
        }
        JobRequest::DeleteInstance { instance } => {
            Route::new(Method::DELETE, &["instances", instance.as_str()])
        }
        JobRequest::UpdateInstance { instance, to } => {
            Route::new(Method::PATCH, &["instances", instance.as_str()])
                .json(json!({ "to": to }))
        }
        JobRequest::Export { apps, instances } => Route::new(Method::POST, &["exports"])
            .json(json!({ "apps": apps, "instances": instances })),
        JobRequest::Import { file_name, archive } => Route {
            body: Body::Archive {
                file_name,
                bytes: archive,
            },
            ..Route::new(Method::POST, &["imports"])
        },
    }
}

impl HttpJobService {
    pub fn new(config: &HttpConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: config.base_url.clone(),
            reason,
        };
        let base_url = Url::parse(&config.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid("expected an http:// or https:// url".to_string()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[String]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Transport(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, route: Route) -> Result<Response, ServiceError> {
        debug!(method = %route.method, path = %route.path(), "api request");
        let url = self.url(&route.segments)?;
        let mut builder = self.client.request(route.method, url);
        if !route.query.is_empty() {
            builder = builder.query(&route.query);
        }
        builder = match route.body {
            Body::Empty => builder,
            Body::Json(body) => builder.json(&body),
            Body::Archive { file_name, bytes } => {
                let part = Part::bytes(bytes).file_name(file_name);
                builder.multipart(Form::new().part("file", part))
            }
        };
        builder
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }
}

async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ServiceError::Transport(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

fn not_found_as(id: QuestId, err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Status { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            ServiceError::NotFound(id)
        }
        other => other,
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn submit(&self, request: JobRequest) -> Result<JobMeta, ServiceError> {
        let kind = request.kind();
        let response = check(self.send(route(request)).await?).await?;
        let meta: JobMeta = decode(response).await?;
        debug!(kind, job_id = %meta.job_id, "job accepted");
        Ok(meta)
    }

    async fn get_quest(&self, id: QuestId) -> Result<Quest, ServiceError> {
        let response = self
            .send(Route::new(Method::GET, &["quests", &id.to_string()]))
            .await?;
        let response = check(response).await.map_err(|e| not_found_as(id, e))?;
        decode(response).await
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, ServiceError> {
        let response = check(self.send(Route::new(Method::GET, &["quests"])).await?).await?;
        decode(response).await
    }

    async fn delete_quest(&self, id: QuestId) -> Result<(), ServiceError> {
        let response = self
            .send(Route::new(Method::DELETE, &["quests", &id.to_string()]))
            .await?;
        check(response).await.map_err(|e| not_found_as(id, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppKey, InstanceId};

    fn app() -> AppKey {
        AppKey::new("tech.flecs.mqtt-bridge", "1.2.0")
    }

    #[test]
    fn install_posts_the_app_key() {
        let r = route(JobRequest::InstallApp { app: app() });
        assert_eq!(r.method, Method::POST);
        assert_eq!(r.path(), "apps/install");
        assert_eq!(
            r.body,
            Body::Json(json!({ "appKey": { "name": "tech.flecs.mqtt-bridge", "version": "1.2.0" } }))
        );
    }

    #[test]
    fn uninstall_puts_the_version_in_the_query() {
        let r = route(JobRequest::UninstallApp { app: app() });
        assert_eq!(r.method, Method::DELETE);
        assert_eq!(r.path(), "apps/tech.flecs.mqtt-bridge");
        assert_eq!(r.query, vec![("version", "1.2.0".to_string())]);
    }

    #[test]
    fn create_instance_names_are_optional() {
        let unnamed = route(JobRequest::CreateInstance {
            app: app(),
            instance_name: None,
        });
        let Body::Json(body) = unnamed.body else {
            panic!("expected json body");
        };
        assert!(body.get("instanceName").is_none());

        let named = route(JobRequest::CreateInstance {
            app: app(),
            instance_name: Some("bridge-1".to_string()),
        });
        let Body::Json(body) = named.body else {
            panic!("expected json body");
        };
        assert_eq!(body["instanceName"], "bridge-1");
    }

    #[test]
    fn instance_routes() {
        let id = InstanceId::new("01a2b3c4");
        assert_eq!(
            route(JobRequest::StartInstance { instance: id.clone() }).path(),
            "instances/01a2b3c4/start"
        );
        assert_eq!(
            route(JobRequest::StopInstance { instance: id.clone() }).path(),
            "instances/01a2b3c4/stop"
        );

        let update = route(JobRequest::UpdateInstance {
            instance: id,
            to: "1.3.0".to_string(),
        });
        assert_eq!(update.method, Method::PATCH);
        assert_eq!(update.body, Body::Json(json!({ "to": "1.3.0" })));
    }

    #[test]
    fn import_is_sent_as_an_archive() {
        let r = route(JobRequest::Import {
            file_name: "backup.tar.gz".to_string(),
            archive: vec![1, 2, 3],
        });
        assert_eq!(r.path(), "imports");
        assert_eq!(
            r.body,
            Body::Archive {
                file_name: "backup.tar.gz".to_string(),
                bytes: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn base_url_must_be_http() {
        let err = HttpJobService::new(&HttpConfig::new("ftp://device")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = HttpJobService::new(&HttpConfig::new("device.local/api/v2")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        for base in ["http://device.local/api/v2/", "http://device.local/api/v2"] {
            let service = HttpJobService::new(&HttpConfig::new(base)).unwrap();
            let url = service.url(&Route::new(Method::GET, &["quests", "3"]).segments).unwrap();
            assert_eq!(url.as_str(), "http://device.local/api/v2/quests/3");
        }
    }

    #[test]
    fn instance_ids_stay_inside_their_path_segment() {
        let service = HttpJobService::new(&HttpConfig::new("http://device.local/api/v2")).unwrap();
        let r = route(JobRequest::StartInstance {
            instance: InstanceId::new("../apps?force=1#x"),
        });

        let url = service.url(&r.segments).unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().map(|s| s.count()), Some(5));
        assert!(url.path().starts_with("/api/v2/instances/"));
        assert!(url.path().ends_with("/start"));
    }

    #[test]
    fn not_found_status_maps_to_the_quest() {
        let err = not_found_as(
            QuestId::new(4),
            ServiceError::Status {
                status: 404,
                body: String::new(),
            },
        );
        assert!(matches!(err, ServiceError::NotFound(id) if id == QuestId::new(4)));
    }
}
