pub mod analysis;
pub mod community;
pub mod feedback;
pub mod user;
