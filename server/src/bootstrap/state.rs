use sqlx::{PgPool, postgres::PgPoolOptions};
use std::collections::HashMap;
use std::sync::Arc;

use domain::{preset::PresetCatalog, pricing::CreditExchange, provider::ProviderKind};
use reelforge_adapters::shared::app_state::AppState as AdaptersAppState;
use reelforge_adapters::outgoing::{
    http_identity::identity_client::HttpIdentityAdapter,
    http_storage::object_store_http::HttpObjectStoreAdapter,
    postgres_sqlx::{
        job_store_postgres::PostgresJobStoreAdapter,
        ledger_store_postgres::PostgresCreditLedgerAdapter,
    },
    providers::{
        fal_queue::FalQueueAdapter, freepik::FreepikAdapter, replicate::ReplicateAdapter,
        runway::RunwayAdapter,
    },
};
use reelforge_application::error::AppError;
use reelforge_application::infrastructure_config::Config;
use reelforge_application::ports::incoming::{
    billing::BillingUseCase,
    generation::{JobLibraryUseCase, ReconcileJobUseCase, SubmitGenerationUseCase},
};
use reelforge_application::ports::outgoing::{
    identity::DynIdentityPort,
    job_store::DynJobStorePort,
    ledger_store::DynCreditLedgerPort,
    object_store::DynObjectStorePort,
    provider_gateway::{DynGenerationProviderPort, ProviderRegistry},
};
use reelforge_application::{
    billing::service::{BillingService, BillingServiceDeps},
    config::{GenerationSettings, PromoSettings},
    generation::{
        reconcile::{ReconcileService, ReconcileServiceDeps},
        service::{DispatchService, DispatchServiceDeps},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    db_pool: PgPool,
    pub submit_service: Arc<dyn SubmitGenerationUseCase + Send + Sync>,
    pub reconcile_service: Arc<dyn ReconcileJobUseCase + Send + Sync>,
    pub library_service: Arc<dyn JobLibraryUseCase + Send + Sync>,
    pub billing_service: Arc<dyn BillingUseCase + Send + Sync>,
    pub identity: DynIdentityPort,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);

        let db_pool = Self::create_database_connections(&config).await?;
        let http_client = Self::create_http_client()?;

        let settings = Self::create_generation_settings(&config)?;
        let ledger: DynCreditLedgerPort = Arc::new(PostgresCreditLedgerAdapter::new(
            db_pool.clone(),
            config.db.query_timeout_seconds,
        ));
        let jobs: DynJobStorePort = Arc::new(PostgresJobStoreAdapter::new(
            db_pool.clone(),
            config.db.query_timeout_seconds,
        ));
        let providers = Self::create_provider_registry(&config, &http_client);
        let objects: DynObjectStorePort = Arc::new(HttpObjectStoreAdapter::new(
            http_client.clone(),
            &config.storage,
        ));
        let identity: DynIdentityPort =
            Arc::new(HttpIdentityAdapter::new(http_client, &config.identity));

        let submit_service = DispatchService::new(
            &settings,
            DispatchServiceDeps {
                ledger: Arc::clone(&ledger),
                jobs: Arc::clone(&jobs),
                providers: Arc::clone(&providers),
                objects: Arc::clone(&objects),
            },
        );
        let reconcile_service = ReconcileService::new(
            &settings,
            ReconcileServiceDeps {
                jobs: Arc::clone(&jobs),
                providers,
                objects,
            },
        );
        let billing_service = BillingService::new(
            PromoSettings {
                code: config.promo.code.clone(),
                credits: config.promo.credits,
            },
            BillingServiceDeps {
                ledger,
                jobs,
            },
        );

        Ok(Self {
            config,
            db_pool,
            submit_service,
            reconcile_service,
            library_service: Arc::clone(&billing_service) as Arc<dyn JobLibraryUseCase + Send + Sync>,
            billing_service,
            identity,
        })
    }

    async fn create_database_connections(config: &Config) -> Result<PgPool, AppError> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db.pool_size)
            .connect(config.db.database_url())
            .await
            .map_err(|e| AppError::DatabaseError {
                message: format!("Failed to connect to database: {}", e),
            })?;

        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| AppError::DatabaseError {
                message: format!("Failed to run database migrations: {}", e),
            })?;

        Ok(db_pool)
    }

    fn create_http_client() -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })
    }

    fn create_generation_settings(config: &Config) -> Result<Arc<GenerationSettings>, AppError> {
        let catalog = PresetCatalog::from_presets(config.generation.presets.clone())?;
        Ok(Arc::new(GenerationSettings {
            catalog: Arc::new(catalog),
            exchange: CreditExchange {
                usd_per_credit: config.generation.usd_per_credit,
            },
            fallback_scene: config.generation.fallback_scene.clone(),
            mirror_outputs: config.storage.mirror_outputs,
        }))
    }

    fn create_provider_registry(
        config: &Config,
        http_client: &reqwest::Client,
    ) -> Arc<ProviderRegistry> {
        let mut adapters: HashMap<ProviderKind, DynGenerationProviderPort> = HashMap::new();
        adapters.insert(
            ProviderKind::Replicate,
            Arc::new(ReplicateAdapter::new(http_client.clone(), &config.providers)),
        );
        adapters.insert(
            ProviderKind::Runway,
            Arc::new(RunwayAdapter::new(http_client.clone(), &config.providers)),
        );
        adapters.insert(
            ProviderKind::Freepik,
            Arc::new(FreepikAdapter::new(http_client.clone(), &config.providers)),
        );
        adapters.insert(
            ProviderKind::FalQueue,
            Arc::new(FalQueueAdapter::new(http_client.clone(), &config.providers)),
        );
        Arc::new(ProviderRegistry::new(adapters))
    }

    pub fn db_pool(&self) -> &PgPool {
        &self.db_pool
    }

    pub fn to_adapters_state(self) -> AdaptersAppState {
        AdaptersAppState::new(
            self.config,
            self.submit_service,
            self.reconcile_service,
            self.library_service,
            self.billing_service,
            self.identity,
        )
    }
}
