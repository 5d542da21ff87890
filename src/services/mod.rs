pub mod analytics_service;
pub mod distribution_service;
pub mod export_service;
pub mod question_service;
pub mod response_service;
pub mod template_service;
