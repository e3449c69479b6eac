pub mod features;
pub mod paging;
pub mod review;
pub mod tour;

pub use features::{QueryFeatures, QueryMap};
pub use paging::Page;
