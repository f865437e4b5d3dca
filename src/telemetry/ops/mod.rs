pub mod stream;
pub mod capture;
pub mod purge;
