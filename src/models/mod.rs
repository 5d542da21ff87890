pub mod analytics;
pub mod distribution;
pub mod question;
pub mod response;
pub mod template;
