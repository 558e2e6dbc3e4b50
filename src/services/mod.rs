pub mod encoding;
pub mod filter;
pub mod formats;
pub mod fsio;
pub mod ident;
pub mod inject;
pub mod merge;
pub mod pipeline;
pub mod project;
pub mod qa;
pub mod store;
