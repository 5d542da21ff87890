pub mod distribution_dto;
pub mod public_dto;
pub mod response_dto;
pub mod template_dto;
