// Resume / job-description matching: entity-set overlap scoring and the
// upload endpoints that drive it.

pub mod handlers;
pub mod scoring;
