// User feedback on generated solutions and the aggregate analytics view.

pub mod analytics;
pub mod handlers;
