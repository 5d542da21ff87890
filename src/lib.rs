pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::database::pool::DbPool;
use crate::services::{
    analytics_service::AnalyticsService, distribution_service::DistributionService,
    question_service::QuestionService, response_service::ResponseService,
    template_service::TemplateService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub template_service: TemplateService,
    pub question_service: QuestionService,
    pub distribution_service: DistributionService,
    pub response_service: ResponseService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(pool: DbPool, config: &Config) -> Self {
        let distribution_service =
            DistributionService::new(pool.clone(), config.access_token_length);
        Self::with_distributions(pool, config, distribution_service)
    }

    /// Builds the state around an already configured distribution service,
    /// e.g. one with a custom token source.
    pub fn with_distributions(
        pool: DbPool,
        config: &Config,
        distribution_service: DistributionService,
    ) -> Self {
        let template_service = TemplateService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let analytics_service = AnalyticsService::new(
            pool.clone(),
            distribution_service.clone(),
            config.analytics_cache_ttl_seconds,
        );
        let response_service = ResponseService::new(
            pool.clone(),
            distribution_service.clone(),
            analytics_service.clone(),
        );

        Self {
            pool,
            template_service,
            question_service,
            distribution_service,
            response_service,
            analytics_service,
        }
    }
}
