use std::sync::Arc;

use reelforge_application::{
    infrastructure_config::Config,
    ports::{
        incoming::{
            billing::BillingUseCase,
            generation::{JobLibraryUseCase, ReconcileJobUseCase, SubmitGenerationUseCase},
        },
        outgoing::identity::DynIdentityPort,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub submit_service: Arc<dyn SubmitGenerationUseCase + Send + Sync>,
    pub reconcile_service: Arc<dyn ReconcileJobUseCase + Send + Sync>,
    pub library_service: Arc<dyn JobLibraryUseCase + Send + Sync>,
    pub billing_service: Arc<dyn BillingUseCase + Send + Sync>,
    pub identity: DynIdentityPort,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        submit_service: Arc<dyn SubmitGenerationUseCase + Send + Sync>,
        reconcile_service: Arc<dyn ReconcileJobUseCase + Send + Sync>,
        library_service: Arc<dyn JobLibraryUseCase + Send + Sync>,
        billing_service: Arc<dyn BillingUseCase + Send + Sync>,
        identity: DynIdentityPort,
    ) -> Self {
        Self {
            config,
            submit_service,
            reconcile_service,
            library_service,
            billing_service,
            identity,
        }
    }
}
