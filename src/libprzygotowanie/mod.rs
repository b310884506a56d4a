pub mod archiwum;
pub mod config;
pub mod error;
pub mod konwersja;
pub mod media;
pub mod pipeline;
pub mod pytania;
pub mod wypakowanie;
