pub mod adapter;
pub mod dialect;
pub mod error;
pub mod requests;

pub mod query {
    pub mod generator;
}
