pub mod transportation_model;
pub mod utils;
