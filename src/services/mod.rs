pub mod listing_service;
pub mod review_service;
pub mod role_service;
pub mod submission_service;
pub mod validation;
