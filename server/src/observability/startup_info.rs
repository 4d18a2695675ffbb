use reelforge_application::infrastructure_config::{
    Config, GenerationConfig, ProvidersConfig, StorageConfig,
};
use tracing::info;

pub fn print_api_info(config: &Config) {
    print_api_documentation_info(config);
    print_configuration_info(config);
}

fn print_api_documentation_info(config: &Config) {
    let base_url = format!("http://{}", config.server_address());
    info!("📋 API Documentation:");
    info!("  📖 Swagger UI: {}/docs", base_url);
    info!("  📄 OpenAPI JSON: {}/api-docs/openapi.json", base_url);
}

fn print_configuration_info(config: &Config) {
    info!("⚙️  Configuration:");
    print_generation_configuration(&config.generation);
    print_provider_configuration(&config.providers);
    print_database_configuration();
    print_storage_configuration(&config.storage);
    print_promo_configuration(config);
}

fn print_generation_configuration(generation: &GenerationConfig) {
    info!(
        "  🎬 Presets: {} loaded (1 credit = ${:.2})",
        generation.presets.len(),
        generation.usd_per_credit
    );
}

#[allow(clippy::cognitive_complexity)]
fn print_provider_configuration(providers: &ProvidersConfig) {
    info!("  🔌 Providers:");
    info!("    • Replicate: {}", providers.replicate.base_url);
    info!("    • Runway: {}", providers.runway.base_url);
    info!("    • Freepik: {}", providers.freepik.base_url);
    info!("    • fal queue: {}", providers.fal.base_url);
}

fn print_database_configuration() {
    info!("  🗄️  Database: PostgreSQL with connection pooling");
}

fn print_storage_configuration(storage: &StorageConfig) {
    if storage.mirror_outputs {
        info!(
            "  📦 Storage: bucket '{}', output mirroring ENABLED",
            storage.bucket
        );
    } else {
        info!(
            "  📦 Storage: bucket '{}', output mirroring DISABLED",
            storage.bucket
        );
    }
}

fn print_promo_configuration(config: &Config) {
    info!(
        "  🎁 Promo: code '{}' grants {} credits (once per account)",
        config.promo.code, config.promo.credits
    );
}
