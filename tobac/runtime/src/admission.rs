use crate::{
    core::{self, Identity, Policy, Reason, ResourceRef, ResourceView},
    directory::SharedCache,
    AdmissionMetrics, ResolveExisting,
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::{
    api::ApiResource,
    core::{admission::Operation, DynamicObject},
    ResourceExt,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};


/// Validates writes against team ownership.
#[derive(Clone)]
pub struct Admission {
    policy: Arc<Policy>,
    teams: SharedCache,
    resolver: Arc<dyn ResolveExisting + Send + Sync>,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: AdmissionReview = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(
        policy: Arc<Policy>,
        teams: SharedCache,
        resolver: Arc<dyn ResolveExisting + Send + Sync>,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            policy,
            teams,
            resolver,
            metrics,
        }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        let mut rsp = AdmissionResponse::from(&req);

        let identity = Identity::new(
            req.user_info.username.as_deref().unwrap_or_default(),
            req.user_info.groups.iter().flatten(),
        );
        let resource = ResourceRef {
            kind: req.kind.kind.clone(),
            namespace: req.namespace.clone(),
            name: req.name.clone(),
        };
        let submitted = req.object.as_ref().map(|obj| view(&resource, obj));
        let mut existing = req.old_object.as_ref().map(|obj| view(&resource, obj));

        // Some DELETE reviews omit the stored object. Cluster admins are allowed without it.
        if existing.is_none()
            && matches!(req.operation, Operation::Delete)
            && !self.policy.is_cluster_admin(&identity)
        {
            let api = ApiResource::from_gvk_with_plural(&req.kind, &req.resource.resource);
            match self.resolver.resolve(&api, &resource).await {
                Ok(view) => existing = view,
                Err(error) => {
                    self.metrics.resolve_failed();
                    warn!(%error, %resource, "Failed to resolve existing resource");
                    return rsp.deny(format!("failed to look up {resource}: {error}"));
                }
            }
        }

        let decision = core::evaluate(&core::Request {
            identity: &identity,
            submitted: submitted.as_ref(),
            existing: existing.as_ref(),
            policy: &self.policy,
            teams: &*self.teams,
        });
        self.metrics.decided(&decision);

        let user = &identity.username;
        let reason = decision.reason;
        if !decision.allowed {
            info!(%resource, %user, code = reason.code(), %reason, "Denied");
            return rsp.deny(reason);
        }

        debug!(%resource, %user, code = reason.code(), %reason, "Allowed");
        if let Reason::Annexed { team, .. } = &reason {
            info!(%resource, %team, "Annexed unlabeled resource");
            rsp.warnings = Some(vec![format!(
                "{resource} had no team label and is now owned by team '{team}'"
            )]);
        }
        rsp
    }
}

fn view(resource: &ResourceRef, obj: &DynamicObject) -> ResourceView {
    let reference = ResourceRef {
        kind: resource.kind.clone(),
        namespace: obj.namespace().or_else(|| resource.namespace.clone()),
        name: Some(obj.name_any())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| resource.name.clone()),
    };
    ResourceView::from_labels(reference, obj.labels())
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
