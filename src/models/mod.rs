pub mod group;
pub mod profile;
pub mod resource;
pub mod settings;
pub mod user;
pub mod vocabulary;

pub use vocabulary::{Category, Subject};
