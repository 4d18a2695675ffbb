use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use domain::{
    auth::{AuthenticatedUser, UserId},
    preset::Preset,
    pricing::{QuoteInputs, quote},
    provider::{GenerationInputs, ProviderAccept, SubmissionRequest},
};

use crate::{
    config::GenerationSettings,
    contracts::generation::{SubmissionReceipt, SubmitGenerationCommand, UploadedAsset},
    error::{AppError, AppResult},
    ports::{
        incoming::generation::SubmitGenerationUseCase,
        outgoing::{
            job_store::{DynJobStorePort, NewJobRecord},
            ledger_store::DynCreditLedgerPort,
            object_store::DynObjectStorePort,
            provider_gateway::{DynGenerationProviderPort, ProviderRegistry},
        },
    },
};

pub struct DispatchServiceDeps {
    pub ledger: DynCreditLedgerPort,
    pub jobs: DynJobStorePort,
    pub providers: Arc<ProviderRegistry>,
    pub objects: DynObjectStorePort,
}

/// Orchestration entry point for submissions: validate, price, charge,
/// submit to the provider, persist. A provider rejection after a charge is
/// compensated with an idempotent refund before the error surfaces.
pub struct DispatchService {
    settings: Arc<GenerationSettings>,
    ledger: DynCreditLedgerPort,
    jobs: DynJobStorePort,
    providers: Arc<ProviderRegistry>,
    objects: DynObjectStorePort,
}

impl DispatchService {
    pub fn new(settings: &Arc<GenerationSettings>, deps: DispatchServiceDeps) -> Arc<Self> {
        Arc::new(Self {
            settings: Arc::clone(settings),
            ledger: deps.ledger,
            jobs: deps.jobs,
            providers: deps.providers,
            objects: deps.objects,
        })
    }

    #[instrument(skip(self, user, command), fields(user_id = %user.id.as_uuid(), preset_id = %command.preset_id))]
    pub async fn submit(
        &self,
        user: &AuthenticatedUser,
        command: SubmitGenerationCommand,
    ) -> AppResult<SubmissionReceipt> {
        let preset = self
            .settings
            .catalog
            .get(&command.preset_id)
            .cloned()
            .ok_or_else(|| AppError::UnknownPreset {
                preset_id: command.preset_id.clone(),
            })?;

        let has_upload = command.upload.is_some();
        let mut inputs = resolve_inputs(&preset, command.inputs, has_upload)?;
        let prompt = preset.render_prompt(&command.scene, &self.settings.fallback_scene);
        let provider = self.providers.get(preset.provider)?;

        self.ledger.ensure_account(&user.id).await?;

        // Upload before the charge so a storage failure cannot leave the
        // user charged for a job that never reached the provider.
        if preset.requires_upload {
            if let Some(asset) = command.upload {
                let key = upload_key(&user.id, &asset);
                let url = self
                    .objects
                    .upload(&key, &asset.content_type, asset.bytes)
                    .await?;
                if preset.requires_source_video {
                    inputs.source_video_url = Some(url);
                } else {
                    inputs.source_image_url = Some(url);
                }
            }
        }

        if preset.pricing.requires_run_index() {
            self.submit_counted(user, &preset, &provider, prompt, inputs)
                .await
        } else {
            self.submit_direct(user, &preset, &provider, prompt, inputs)
                .await
        }
    }

    async fn submit_direct(
        &self,
        user: &AuthenticatedUser,
        preset: &Preset,
        provider: &DynGenerationProviderPort,
        prompt: String,
        inputs: GenerationInputs,
    ) -> AppResult<SubmissionReceipt> {
        let cost = quote(
            &preset.pricing,
            &price_inputs(&inputs, None),
            self.settings.exchange,
        )?;

        let attempt_id = Uuid::new_v4();
        let credits_left = if cost > 0 {
            self.ledger.charge(&user.id, cost).await?
        } else {
            self.ledger.balance(&user.id).await?.credits
        };

        let request = SubmissionRequest {
            model: preset.model.clone(),
            prompt,
            inputs,
        };

        let accept = match provider.submit(&request).await {
            Ok(accept) => accept,
            Err(err) => {
                if cost > 0 {
                    if let Err(refund_err) = self.ledger.refund(&user.id, attempt_id, cost).await {
                        error!(
                            error = %refund_err,
                            %attempt_id,
                            "compensating refund failed after provider rejection"
                        );
                    }
                }
                return Err(submission_failure(err));
            }
        };

        let record = job_record(user, preset, &request, accept, cost)?;
        let job = self.jobs.insert_job(record).await?;

        Ok(SubmissionReceipt {
            job,
            cost,
            credits_left,
            run_index: None,
        })
    }

    /// Counted pricing: the run-index read, the charge, and the job insert
    /// share one serialized unit per `(user, preset)`. The unit stays open
    /// across the provider call so a rejection rolls the charge back with
    /// the transaction.
    async fn submit_counted(
        &self,
        user: &AuthenticatedUser,
        preset: &Preset,
        provider: &DynGenerationProviderPort,
        prompt: String,
        inputs: GenerationInputs,
    ) -> AppResult<SubmissionReceipt> {
        let mut txn = self
            .jobs
            .begin_counted_submission(&user.id, &preset.id)
            .await?;
        let run_index = txn.run_index();

        let cost = quote(
            &preset.pricing,
            &price_inputs(&inputs, Some(run_index)),
            self.settings.exchange,
        )?;

        let credits_left = if cost > 0 {
            txn.charge(&user.id, cost).await?
        } else {
            self.ledger.balance(&user.id).await?.credits
        };

        let request = SubmissionRequest {
            model: preset.model.clone(),
            prompt,
            inputs,
        };

        let accept = match provider.submit(&request).await {
            Ok(accept) => accept,
            // Dropping the transaction rolls back the charge.
            Err(err) => return Err(submission_failure(err)),
        };

        let record = job_record(user, preset, &request, accept, cost)?;
        let job = txn.insert_job(record).await?;
        txn.commit().await?;

        Ok(SubmissionReceipt {
            job,
            cost,
            credits_left,
            run_index: Some(run_index),
        })
    }
}

fn resolve_inputs(
    preset: &Preset,
    mut inputs: GenerationInputs,
    has_upload: bool,
) -> AppResult<GenerationInputs> {
    let defaults = &preset.defaults;
    if inputs.duration_sec.is_none() {
        inputs.duration_sec = defaults.duration_sec;
    }
    if inputs.aspect_ratio.is_none() {
        inputs.aspect_ratio = defaults.aspect_ratio.clone();
    }
    if inputs.resolution.is_none() {
        inputs.resolution = defaults.resolution.clone();
    }
    if inputs.generate_audio.is_none() {
        inputs.generate_audio = defaults.generate_audio;
    }

    let upload_covers_video = preset.requires_upload && has_upload && preset.requires_source_video;
    let upload_covers_image = preset.requires_upload && has_upload && !preset.requires_source_video;

    if preset.requires_source_image && inputs.source_image_url.is_none() && !upload_covers_image {
        return Err(AppError::InvalidParameters {
            message: "a source image is required for this preset".to_string(),
        });
    }

    if preset.requires_source_video && inputs.source_video_url.is_none() && !upload_covers_video {
        return Err(AppError::InvalidParameters {
            message: "a source video is required for this preset".to_string(),
        });
    }

    if let (Some(bounds), Some(duration)) = (preset.duration_bounds, inputs.duration_sec) {
        if !bounds.contains(duration) {
            return Err(AppError::InvalidParameters {
                message: format!(
                    "duration must be between {} and {} seconds",
                    bounds.min_sec, bounds.max_sec
                ),
            });
        }
    }

    Ok(inputs)
}

fn price_inputs(inputs: &GenerationInputs, run_index: Option<i64>) -> QuoteInputs {
    QuoteInputs {
        duration_sec: inputs.duration_sec,
        size_bucket: inputs.size.clone().or_else(|| inputs.resolution.clone()),
        output_count: inputs.output_count,
        run_index,
    }
}

fn job_record(
    user: &AuthenticatedUser,
    preset: &Preset,
    request: &SubmissionRequest,
    accept: ProviderAccept,
    cost: i64,
) -> AppResult<NewJobRecord> {
    Ok(NewJobRecord {
        user_id: user.id.clone(),
        preset_id: preset.id.clone(),
        external_job_id: accept.external_job_id,
        provider: preset.provider,
        model: request.model.clone(),
        prompt: request.prompt.clone(),
        request_params: serde_json::to_value(&request.inputs)?,
        status: accept.initial_status,
        cost,
        duration_sec: request.inputs.duration_sec,
        aspect_ratio: request.inputs.aspect_ratio.clone(),
        generate_audio: request.inputs.generate_audio,
    })
}

fn submission_failure(err: AppError) -> AppError {
    match err {
        err @ AppError::ProviderSubmissionFailed { .. } => err,
        other => AppError::ProviderSubmissionFailed {
            details: other.to_string(),
        },
    }
}

fn upload_key(user_id: &UserId, asset: &UploadedAsset) -> String {
    let ext = asset
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .or_else(|| extension_for(&asset.content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("uploads/{}/{}.{}", user_id.as_uuid(), Uuid::new_v4(), ext)
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[async_trait::async_trait]
impl SubmitGenerationUseCase for DispatchService {
    async fn submit_generation(
        &self,
        user: &AuthenticatedUser,
        command: SubmitGenerationCommand,
    ) -> AppResult<SubmissionReceipt> {
        self.submit(user, command).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use time::OffsetDateTime;

    use domain::{
        credits::CreditBalance,
        job::{ExternalJobId, GenerationJob, JobId, JobStatus},
        preset::{DurationBounds, PresetCatalog, PresetDefaults},
        pricing::{CreditExchange, PricingStrategy},
        provider::ProviderKind,
    };

    use super::*;
    use crate::ports::outgoing::{
        job_store::{CountedSubmission, MockJobStorePort},
        ledger_store::MockCreditLedgerPort,
        object_store::MockObjectStorePort,
        provider_gateway::MockGenerationProviderPort,
    };

    fn preset(id: &str, pricing: PricingStrategy) -> Preset {
        Preset {
            id: id.to_string(),
            provider: ProviderKind::Replicate,
            model: "vendor/model".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing,
            requires_source_image: false,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        }
    }

    fn settings(presets: Vec<Preset>) -> Arc<GenerationSettings> {
        Arc::new(GenerationSettings {
            catalog: Arc::new(PresetCatalog::from_presets(presets).unwrap()),
            exchange: CreditExchange::default(),
            fallback_scene: "a cinematic realistic shot".to_string(),
            mirror_outputs: false,
        })
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::new(),
            email: Some("user@example.com".to_string()),
        }
    }

    fn accept(id: &str) -> ProviderAccept {
        ProviderAccept {
            external_job_id: ExternalJobId(id.to_string()),
            initial_status: JobStatus::Starting,
        }
    }

    fn job_from_record(record: &NewJobRecord) -> GenerationJob {
        GenerationJob {
            id: JobId(1),
            user_id: record.user_id.clone(),
            preset_id: record.preset_id.clone(),
            external_job_id: Some(record.external_job_id.clone()),
            provider: record.provider,
            model: record.model.clone(),
            prompt: record.prompt.clone(),
            request_params: record.request_params.clone(),
            status: record.status,
            cost: record.cost,
            duration_sec: record.duration_sec,
            aspect_ratio: record.aspect_ratio.clone(),
            generate_audio: record.generate_audio,
            output_url: None,
            title: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn registry(provider: MockGenerationProviderPort) -> Arc<ProviderRegistry> {
        let mut adapters: HashMap<ProviderKind, DynGenerationProviderPort> = HashMap::new();
        adapters.insert(ProviderKind::Replicate, Arc::new(provider));
        Arc::new(ProviderRegistry::new(adapters))
    }

    fn service(
        presets: Vec<Preset>,
        ledger: MockCreditLedgerPort,
        jobs: MockJobStorePort,
        provider: MockGenerationProviderPort,
        objects: MockObjectStorePort,
    ) -> Arc<DispatchService> {
        DispatchService::new(
            &settings(presets),
            DispatchServiceDeps {
                ledger: Arc::new(ledger),
                jobs: Arc::new(jobs),
                providers: registry(provider),
                objects: Arc::new(objects),
            },
        )
    }

    fn command(preset_id: &str) -> SubmitGenerationCommand {
        SubmitGenerationCommand {
            preset_id: preset_id.to_string(),
            scene: "a foggy harbor at dawn".to_string(),
            inputs: GenerationInputs::default(),
            upload: None,
        }
    }

    struct FakeCountedSubmission {
        run_index: i64,
        charges: Arc<Mutex<Vec<i64>>>,
        inserted: Arc<Mutex<Vec<NewJobRecord>>>,
        committed: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl CountedSubmission for FakeCountedSubmission {
        fn run_index(&self) -> i64 {
            self.run_index
        }

        async fn charge(&mut self, _user_id: &UserId, amount: i64) -> AppResult<i64> {
            self.charges.lock().unwrap().push(amount);
            Ok(10 - amount)
        }

        async fn insert_job(&mut self, record: NewJobRecord) -> AppResult<GenerationJob> {
            let job = job_from_record(&record);
            self.inserted.lock().unwrap().push(record);
            Ok(job)
        }

        async fn commit(self: Box<Self>) -> AppResult<()> {
            self.committed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected_before_any_side_effect() {
        let svc = service(
            vec![preset("flat", PricingStrategy::Flat { credits: 3 })],
            MockCreditLedgerPort::new(),
            MockJobStorePort::new(),
            MockGenerationProviderPort::new(),
            MockObjectStorePort::new(),
        );

        let err = svc.submit(&user(), command("nope")).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownPreset { preset_id } if preset_id == "nope"));
    }

    #[tokio::test]
    async fn missing_source_image_fails_validation_without_charging() {
        let mut image_preset = preset("img", PricingStrategy::Flat { credits: 1 });
        image_preset.requires_source_image = true;

        let svc = service(
            vec![image_preset],
            MockCreditLedgerPort::new(),
            MockJobStorePort::new(),
            MockGenerationProviderPort::new(),
            MockObjectStorePort::new(),
        );

        let err = svc.submit(&user(), command("img")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn out_of_bounds_duration_is_rejected() {
        let mut timed = preset(
            "timed",
            PricingStrategy::PerSecondUsd {
                usd_per_second: 0.07,
            },
        );
        timed.duration_bounds = Some(DurationBounds {
            min_sec: 3.0,
            max_sec: 10.0,
        });

        let svc = service(
            vec![timed],
            MockCreditLedgerPort::new(),
            MockJobStorePort::new(),
            MockGenerationProviderPort::new(),
            MockObjectStorePort::new(),
        );

        let mut cmd = command("timed");
        cmd.inputs.duration_sec = Some(30.0);
        let err = svc.submit(&user(), cmd).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn insufficient_credits_creates_no_job() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger.expect_charge().returning(|_, _| {
            Err(AppError::InsufficientCredits {
                balance: 2,
                required: 3,
            })
        });

        let svc = service(
            vec![preset("flat", PricingStrategy::Flat { credits: 3 })],
            ledger,
            MockJobStorePort::new(),
            MockGenerationProviderPort::new(),
            MockObjectStorePort::new(),
        );

        let err = svc.submit(&user(), command("flat")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                balance: 2,
                required: 3
            }
        ));
    }

    #[tokio::test]
    async fn provider_rejection_refunds_the_exact_charge() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger.expect_charge().returning(|_, _| Ok(2));
        ledger
            .expect_refund()
            .withf(|_, _, amount| *amount == 3)
            .times(1)
            .returning(|_, _, _| Ok(5));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_submit().returning(|_| {
            Err(AppError::ProviderSubmissionFailed {
                details: "upstream 500".to_string(),
            })
        });

        let svc = service(
            vec![preset("flat", PricingStrategy::Flat { credits: 3 })],
            ledger,
            MockJobStorePort::new(),
            provider,
            MockObjectStorePort::new(),
        );

        let err = svc.submit(&user(), command("flat")).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderSubmissionFailed { .. }));
    }

    #[tokio::test]
    async fn successful_submission_persists_the_fixed_cost() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger.expect_charge().times(1).returning(|_, _| Ok(2));

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_submit().returning(|_| Ok(accept("ext-1")));

        let mut jobs = MockJobStorePort::new();
        jobs.expect_insert_job()
            .withf(|record| record.cost == 3 && record.external_job_id.as_str() == "ext-1")
            .returning(|record| Ok(job_from_record(&record)));

        let svc = service(
            vec![preset("flat", PricingStrategy::Flat { credits: 3 })],
            ledger,
            jobs,
            provider,
            MockObjectStorePort::new(),
        );

        let receipt = svc.submit(&user(), command("flat")).await.unwrap();
        assert_eq!(receipt.cost, 3);
        assert_eq!(receipt.credits_left, 2);
        assert_eq!(receipt.job.status, JobStatus::Starting);
        assert!(receipt.run_index.is_none());
    }

    #[tokio::test]
    async fn every_fourth_counted_run_costs_nothing() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger.expect_balance().returning(|_| {
            Ok(CreditBalance::new(7, OffsetDateTime::UNIX_EPOCH))
        });

        let charges = Arc::new(Mutex::new(Vec::new()));
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let committed = Arc::new(AtomicBool::new(false));

        let mut jobs = MockJobStorePort::new();
        {
            let charges = Arc::clone(&charges);
            let inserted = Arc::clone(&inserted);
            let committed = Arc::clone(&committed);
            jobs.expect_begin_counted_submission().returning(move |_, _| {
                Ok(Box::new(FakeCountedSubmission {
                    run_index: 4,
                    charges: Arc::clone(&charges),
                    inserted: Arc::clone(&inserted),
                    committed: Arc::clone(&committed),
                }))
            });
        }

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_submit().returning(|_| Ok(accept("ext-4")));

        let svc = service(
            vec![preset(
                "counted",
                PricingStrategy::EveryNthFree {
                    every: 4,
                    paid_credits: 1,
                },
            )],
            ledger,
            jobs,
            provider,
            MockObjectStorePort::new(),
        );

        let receipt = svc.submit(&user(), command("counted")).await.unwrap();
        assert_eq!(receipt.cost, 0);
        assert_eq!(receipt.credits_left, 7);
        assert_eq!(receipt.run_index, Some(4));
        assert!(charges.lock().unwrap().is_empty());
        assert_eq!(inserted.lock().unwrap().len(), 1);
        assert!(committed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn paid_counted_run_charges_inside_the_serialized_unit() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));

        let charges = Arc::new(Mutex::new(Vec::new()));
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let committed = Arc::new(AtomicBool::new(false));

        let mut jobs = MockJobStorePort::new();
        {
            let charges = Arc::clone(&charges);
            let inserted = Arc::clone(&inserted);
            let committed = Arc::clone(&committed);
            jobs.expect_begin_counted_submission().returning(move |_, _| {
                Ok(Box::new(FakeCountedSubmission {
                    run_index: 2,
                    charges: Arc::clone(&charges),
                    inserted: Arc::clone(&inserted),
                    committed: Arc::clone(&committed),
                }))
            });
        }

        let mut provider = MockGenerationProviderPort::new();
        provider.expect_submit().returning(|_| Ok(accept("ext-2")));

        let svc = service(
            vec![preset(
                "counted",
                PricingStrategy::EveryNthFree {
                    every: 4,
                    paid_credits: 1,
                },
            )],
            ledger,
            jobs,
            provider,
            MockObjectStorePort::new(),
        );

        let receipt = svc.submit(&user(), command("counted")).await.unwrap();
        assert_eq!(receipt.cost, 1);
        assert_eq!(*charges.lock().unwrap(), vec![1]);
        assert!(committed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn upload_preset_stores_the_asset_before_charging() {
        let mut upload_preset = preset(
            "edit",
            PricingStrategy::PerSecondUsd {
                usd_per_second: 0.10,
            },
        );
        upload_preset.requires_source_video = true;
        upload_preset.requires_upload = true;
        upload_preset.defaults.duration_sec = Some(5.0);

        let mut objects = MockObjectStorePort::new();
        objects
            .expect_upload()
            .withf(|key, content_type, _| key.ends_with(".mp4") && content_type == "video/mp4")
            .times(1)
            .returning(|_, _, _| Ok("https://store.example/clip.mp4".to_string()));

        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger.expect_charge().returning(|_, _| Ok(4));

        let mut provider = MockGenerationProviderPort::new();
        provider
            .expect_submit()
            .withf(|request| {
                request.inputs.source_video_url.as_deref() == Some("https://store.example/clip.mp4")
            })
            .returning(|_| Ok(accept("ext-up")));

        let mut jobs = MockJobStorePort::new();
        jobs.expect_insert_job()
            .returning(|record| Ok(job_from_record(&record)));

        let svc = service(vec![upload_preset], ledger, jobs, provider, objects);

        let mut cmd = command("edit");
        cmd.upload = Some(UploadedAsset {
            file_name: Some("clip.mp4".to_string()),
            content_type: "video/mp4".to_string(),
            bytes: vec![0u8; 16],
        });

        let receipt = svc.submit(&user(), cmd).await.unwrap();
        assert_eq!(receipt.job.external_job_id.unwrap().as_str(), "ext-up");
    }
}
