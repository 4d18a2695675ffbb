use std::sync::Arc;
use tracing::{debug, instrument, warn};

use domain::{
    auth::UserId,
    job::{ExternalJobId, JobStatus},
    provider::{PollOutcome, PollQuery, ProviderResult},
};

use crate::{
    config::GenerationSettings,
    contracts::generation::ReconcileOutcome,
    error::{AppError, AppResult},
    ports::{
        incoming::generation::ReconcileJobUseCase,
        outgoing::{
            job_store::DynJobStorePort, object_store::DynObjectStorePort,
            provider_gateway::ProviderRegistry,
        },
    },
};

pub struct ReconcileServiceDeps {
    pub jobs: DynJobStorePort,
    pub providers: Arc<ProviderRegistry>,
    pub objects: DynObjectStorePort,
}

/// Polls queue-based providers and idempotently drives jobs to a terminal
/// state. Transient status trouble keeps a job in `processing`; a flaky
/// poll must never cost a user a finished generation.
pub struct ReconcileService {
    settings: Arc<GenerationSettings>,
    jobs: DynJobStorePort,
    providers: Arc<ProviderRegistry>,
    objects: DynObjectStorePort,
}

impl ReconcileService {
    pub fn new(settings: &Arc<GenerationSettings>, deps: ReconcileServiceDeps) -> Arc<Self> {
        Arc::new(Self {
            settings: Arc::clone(settings),
            jobs: deps.jobs,
            providers: deps.providers,
            objects: deps.objects,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id.as_uuid(), external_job_id = %external_job_id.as_str()))]
    pub async fn reconcile(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
    ) -> AppResult<ReconcileOutcome> {
        let Some(job) = self
            .jobs
            .find_by_external_id(user_id, external_job_id)
            .await?
        else {
            return Err(AppError::NotFound {
                message: format!("no job with handle {}", external_job_id.as_str()),
            });
        };

        if job.status.is_terminal() {
            return Ok(ReconcileOutcome {
                status: job.status,
                output_url: job.output_url,
            });
        }

        let provider = self.providers.get(job.provider)?;
        let query = PollQuery {
            external_job_id: external_job_id.clone(),
            model: job.model.clone(),
        };

        let outcome = match provider.poll(&query).await {
            Ok(outcome) => outcome,
            Err(AppError::ProviderTransient { message }) => {
                debug!(%message, "transient provider state, job stays processing");
                return Ok(ReconcileOutcome {
                    status: JobStatus::Processing,
                    output_url: None,
                });
            }
            Err(other) => return Err(other),
        };

        match outcome {
            PollOutcome::Pending(status) => Ok(ReconcileOutcome {
                status,
                output_url: None,
            }),
            PollOutcome::Failed { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("unknown"), "provider reported failure");
                self.jobs
                    .mark_terminal(user_id, external_job_id, JobStatus::Failed, None)
                    .await?;
                Ok(ReconcileOutcome {
                    status: JobStatus::Failed,
                    output_url: None,
                })
            }
            PollOutcome::Succeeded(result) => {
                let result = if self.settings.mirror_outputs {
                    self.rehost(user_id, external_job_id, result).await
                } else {
                    result
                };
                let canonical = result.canonical_url().map(str::to_string);

                let updated = self
                    .jobs
                    .mark_terminal(
                        user_id,
                        external_job_id,
                        JobStatus::Succeeded,
                        canonical.clone(),
                    )
                    .await?;
                if !updated {
                    // Row deleted or already terminal; the race resolves in
                    // the row's favor.
                    debug!("terminal write matched no live row");
                }

                Ok(ReconcileOutcome {
                    status: JobStatus::Succeeded,
                    output_url: canonical,
                })
            }
        }
    }

    /// Mirrors each result asset into our storage. Failures are non-fatal:
    /// the provider-hosted URL stays usable as a fallback.
    async fn rehost(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
        result: ProviderResult,
    ) -> ProviderResult {
        let mut rehosted = result.clone();
        for (label, source_url) in result.assets() {
            let key = format!(
                "outputs/{}/{}-{}{}",
                user_id.as_uuid(),
                external_job_id.as_str(),
                label,
                extension_of(source_url)
            );
            match self.objects.mirror(&key, source_url).await {
                Ok(public_url) => match label {
                    "output" => rehosted.output_url = Some(public_url),
                    "glb" => rehosted.model_glb_url = Some(public_url),
                    "obj" => rehosted.model_obj_url = Some(public_url),
                    _ => rehosted.thumbnail_url = Some(public_url),
                },
                Err(err) => {
                    warn!(error = %err, %label, "asset re-host failed, keeping provider URL");
                }
            }
        }
        rehosted
    }
}

fn extension_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit_once('/')
        .map_or(path, |(_, file)| file)
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl ReconcileJobUseCase for ReconcileService {
    async fn reconcile_job(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
    ) -> AppResult<ReconcileOutcome> {
        self.reconcile(user_id, external_job_id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use time::OffsetDateTime;

    use domain::{
        job::{GenerationJob, JobId},
        preset::PresetCatalog,
        pricing::CreditExchange,
        provider::ProviderKind,
    };

    use super::*;
    use crate::ports::outgoing::{
        job_store::MockJobStorePort,
        object_store::MockObjectStorePort,
        provider_gateway::{DynGenerationProviderPort, MockGenerationProviderPort},
    };

    fn job(status: JobStatus, output_url: Option<&str>) -> GenerationJob {
        GenerationJob {
            id: JobId(7),
            user_id: UserId::new(),
            preset_id: "kling_o1_edit".to_string(),
            external_job_id: Some(ExternalJobId("ext-7".to_string())),
            provider: ProviderKind::FalQueue,
            model: "fal-ai/kling-video/o1/standard/video-to-video".to_string(),
            prompt: "a foggy harbor".to_string(),
            request_params: serde_json::json!({}),
            status,
            cost: 4,
            duration_sec: Some(5.0),
            aspect_ratio: None,
            generate_audio: None,
            output_url: output_url.map(str::to_string),
            title: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn service(
        jobs: MockJobStorePort,
        provider: MockGenerationProviderPort,
        objects: MockObjectStorePort,
        mirror_outputs: bool,
    ) -> Arc<ReconcileService> {
        let mut adapters: HashMap<ProviderKind, DynGenerationProviderPort> = HashMap::new();
        adapters.insert(ProviderKind::FalQueue, Arc::new(provider));
        let settings = Arc::new(GenerationSettings {
            catalog: Arc::new(PresetCatalog::from_presets(Vec::new()).unwrap()),
            exchange: CreditExchange::default(),
            fallback_scene: String::new(),
            mirror_outputs,
        });
        ReconcileService::new(
            &settings,
            ReconcileServiceDeps {
                jobs: Arc::new(jobs),
                providers: Arc::new(ProviderRegistry::new(adapters)),
                objects: Arc::new(objects),
            },
        )
    }

    #[tokio::test]
    async fn terminal_job_short_circuits_without_polling() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id().returning(|_, _| {
            Ok(Some(job(
                JobStatus::Succeeded,
                Some("https://cdn.example/out.mp4"),
            )))
        });

        // provider mock has no expectations: any poll would panic
        let svc = service(
            jobs,
            MockGenerationProviderPort::new(),
            MockObjectStorePort::new(),
            false,
        );

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Succeeded);
        assert_eq!(outcome.output_url.as_deref(), Some("https://cdn.example/out.mp4"));
    }

    #[tokio::test]
    async fn transient_poll_trouble_keeps_the_job_processing() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id()
            .returning(|_, _| Ok(Some(job(JobStatus::Processing, None))));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_poll().returning(|_| {
            Err(AppError::ProviderTransient {
                message: "status endpoint returned 409".to_string(),
            })
        });

        let svc = service(jobs, provider, MockObjectStorePort::new(), false);

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Processing);
        assert!(outcome.output_url.is_none());
    }

    #[tokio::test]
    async fn provider_failure_marks_the_job_failed() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id()
            .returning(|_, _| Ok(Some(job(JobStatus::Processing, None))));
        jobs.expect_mark_terminal()
            .withf(|_, _, status, output| *status == JobStatus::Failed && output.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_poll().returning(|_| {
            Ok(PollOutcome::Failed {
                reason: Some("content policy".to_string()),
            })
        });

        let svc = service(jobs, provider, MockObjectStorePort::new(), false);

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn alternate_format_only_result_still_yields_a_canonical_url() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id()
            .returning(|_, _| Ok(Some(job(JobStatus::Processing, None))));
        jobs.expect_mark_terminal()
            .withf(|_, _, status, output| {
                *status == JobStatus::Succeeded
                    && output.as_deref() == Some("https://provider.example/mesh.glb")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_poll().returning(|_| {
            Ok(PollOutcome::Succeeded(ProviderResult {
                model_glb_url: Some("https://provider.example/mesh.glb".to_string()),
                ..ProviderResult::default()
            }))
        });

        let svc = service(jobs, provider, MockObjectStorePort::new(), false);

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Succeeded);
        assert_eq!(
            outcome.output_url.as_deref(),
            Some("https://provider.example/mesh.glb")
        );
    }

    #[tokio::test]
    async fn rehost_failure_falls_back_to_the_provider_url() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id()
            .returning(|_, _| Ok(Some(job(JobStatus::Processing, None))));
        jobs.expect_mark_terminal()
            .withf(|_, _, _, output| {
                output.as_deref() == Some("https://provider.example/out.mp4")
            })
            .returning(|_, _, _, _| Ok(true));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_poll().returning(|_| {
            Ok(PollOutcome::Succeeded(ProviderResult {
                output_url: Some("https://provider.example/out.mp4".to_string()),
                ..ProviderResult::default()
            }))
        });

        let mut objects = MockObjectStorePort::new();
        objects.expect_mirror().returning(|_, _| {
            Err(AppError::StorageFailure {
                message: "bucket unreachable".to_string(),
            })
        });

        let svc = service(jobs, provider, objects, true);

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Succeeded);
        assert_eq!(
            outcome.output_url.as_deref(),
            Some("https://provider.example/out.mp4")
        );
    }

    #[tokio::test]
    async fn reconcile_races_safely_with_a_hard_delete() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_find_by_external_id()
            .returning(|_, _| Ok(Some(job(JobStatus::Processing, None))));
        // delete won the race: the terminal write matches nothing
        jobs.expect_mark_terminal().returning(|_, _, _, _| Ok(false));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_poll().returning(|_| {
            Ok(PollOutcome::Succeeded(ProviderResult {
                output_url: Some("https://provider.example/out.mp4".to_string()),
                ..ProviderResult::default()
            }))
        });

        let svc = service(jobs, provider, MockObjectStorePort::new(), false);

        let outcome = svc
            .reconcile(&UserId::new(), &ExternalJobId("ext-7".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Succeeded);
    }
}
