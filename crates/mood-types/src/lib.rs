pub mod documents;
pub mod models;
pub mod remote;
